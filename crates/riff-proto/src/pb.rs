//! Protobuf wire types for `proto/function.proto`.
//!
//! Kept in the shape `prost` code generation emits so the crate builds
//! without `protoc`; update both files together.

use std::collections::HashMap;

use crate::error::HeaderError;
use crate::headers::HeaderMap;

/// Wire form of [`crate::Message`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(bytes = "bytes", tag = "1")]
    pub payload: ::prost::bytes::Bytes,
    #[prost(map = "string, message", tag = "2")]
    pub headers: HashMap<String, message::HeaderValue>,
}

/// Nested message and enum types in `Message`.
pub mod message {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HeaderValue {
        #[prost(string, repeated, tag = "1")]
        pub values: Vec<String>,
    }
}

fn wire_headers(headers: &HeaderMap) -> HashMap<String, message::HeaderValue> {
    headers
        .iter()
        .map(|(name, values)| {
            (
                name.to_owned(),
                message::HeaderValue {
                    values: values.to_vec(),
                },
            )
        })
        .collect()
}

impl From<crate::Message> for Message {
    fn from(message: crate::Message) -> Self {
        let (headers, payload) = message.into_parts();
        Self {
            payload,
            headers: wire_headers(&headers),
        }
    }
}

impl From<&crate::Message> for Message {
    fn from(message: &crate::Message) -> Self {
        Self {
            payload: message.payload().clone(),
            headers: wire_headers(message.headers()),
        }
    }
}

impl TryFrom<Message> for crate::Message {
    type Error = HeaderError;

    fn try_from(wire: Message) -> Result<Self, Self::Error> {
        // Map order is unspecified; sort so keys differing only in case
        // always merge the same way.
        let mut entries: Vec<_> = wire.headers.into_iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

        let headers =
            HeaderMap::from_wire_form(entries.into_iter().map(|(name, v)| (name, v.values)))?;
        Ok(Self::new(headers, wire.payload))
    }
}
