//! Wire messages and the immutable message builder.

use bytes::Bytes;

use crate::error::HeaderError;
use crate::headers::HeaderMap;
use crate::value::IntoHeaderValue;

/// An immutable invocation message: headers plus a binary payload.
///
/// The payload is always present; a message built without one carries an
/// empty byte sequence. Cloning is cheap, header storage and payload bytes
/// are shared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    headers: HeaderMap,
    payload: Bytes,
}

impl Message {
    /// Creates a message from headers and a payload.
    #[must_use]
    pub fn new(headers: HeaderMap, payload: impl Into<Bytes>) -> Self {
        Self {
            headers,
            payload: payload.into(),
        }
    }

    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Splits the message into its headers and payload.
    #[must_use]
    pub fn into_parts(self) -> (HeaderMap, Bytes) {
        (self.headers, self.payload)
    }
}

/// Immutable fluent builder for [`Message`].
///
/// Every method returns a new builder, so a partially built message can be
/// reused as the root of several independent branches:
///
/// ```
/// use riff_proto::MessageBuilder;
///
/// let root = MessageBuilder::new().add_header("Content-Type", ["text/plain"])?;
/// let hello = root.payload("hello").build();
/// let bye = root.add_header("X-Final", [true])?.payload("bye").build();
///
/// assert!(!hello.headers().contains("X-Final"));
/// assert_eq!(bye.payload().as_ref(), b"bye");
/// # Ok::<(), riff_proto::HeaderError>(())
/// ```
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct MessageBuilder {
    headers: HeaderMap,
    payload: Option<Bytes>,
}

impl MessageBuilder {
    /// Creates a builder with no headers and no payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded with existing headers.
    pub fn from_headers(headers: HeaderMap) -> Self {
        Self {
            headers,
            payload: None,
        }
    }

    /// Creates a builder seeded with a message's headers and payload.
    pub fn from_message(message: &Message) -> Self {
        Self {
            headers: message.headers.clone(),
            payload: Some(message.payload.clone()),
        }
    }

    /// Appends header values; see [`HeaderMap::add_header`].
    pub fn add_header<I>(&self, name: impl AsRef<str>, values: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator,
        I::Item: IntoHeaderValue,
    {
        Ok(Self {
            headers: self.headers.add_header(name, values)?,
            payload: self.payload.clone(),
        })
    }

    /// Overwrites a header slot; see [`HeaderMap::replace_header`].
    pub fn replace_header<I>(&self, name: impl AsRef<str>, values: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator,
        I::Item: IntoHeaderValue,
    {
        Ok(Self {
            headers: self.headers.replace_header(name, values)?,
            payload: self.payload.clone(),
        })
    }

    /// Sets the payload, replacing any previously set one.
    pub fn payload(&self, payload: impl Into<Bytes>) -> Self {
        Self {
            headers: self.headers.clone(),
            payload: Some(payload.into()),
        }
    }

    /// Headers accumulated so far.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Produces a message snapshot. Calling it again yields an equal message.
    #[must_use]
    pub fn build(&self) -> Message {
        Message {
            headers: self.headers.clone(),
            payload: self.payload.clone().unwrap_or_default(),
        }
    }
}

impl From<MessageBuilder> for Message {
    fn from(builder: MessageBuilder) -> Self {
        Self {
            headers: builder.headers,
            payload: builder.payload.unwrap_or_default(),
        }
    }
}
