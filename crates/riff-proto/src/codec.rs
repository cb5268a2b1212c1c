//! Framed byte encoding of a [`Message`] for byte-oriented transports.
//!
//! Layout:
//!
//! ```text
//! ┌────────┬────────────┬──────────────────────────────────────────┬─────────┐
//! │ 0xFF   │ count (u8) │ count × header                           │ payload │
//! └────────┴────────────┴──────────────────────────────────────────┴─────────┘
//!
//! header: name len (u8) │ name │ values len (u32, BE) │ JSON array of strings
//! ```
//!
//! The payload has no length prefix; it runs to the end of the frame.

use crate::error::ProtocolError;
use crate::headers::HeaderMap;
use crate::message::Message;

/// Leading byte of every frame.
pub const FRAME_MARKER: u8 = 0xff;

/// Most headers a frame can carry.
pub const MAX_HEADERS: usize = u8::MAX as usize;

/// Longest header name, in bytes, a frame can carry.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Codec for encoding and decoding framed messages.
#[derive(Debug, Default)]
pub struct Codec {
    /// Reusable buffer for encoding.
    buffer: Vec<u8>,
}

impl Codec {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a codec with pre-allocated buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encodes a message into the internal buffer and returns the frame.
    ///
    /// On error the buffer is left empty.
    pub fn encode(&mut self, message: &Message) -> Result<&[u8], ProtocolError> {
        self.buffer.clear();
        if let Err(e) = self.write_frame(message) {
            self.buffer.clear();
            return Err(e);
        }
        Ok(&self.buffer)
    }

    fn write_frame(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let headers = message.headers();
        if headers.len() > MAX_HEADERS {
            return Err(ProtocolError::TooManyHeaders {
                count: headers.len(),
                max: MAX_HEADERS,
            });
        }

        self.buffer.push(FRAME_MARKER);
        #[allow(clippy::cast_possible_truncation)]
        self.buffer.push(headers.len() as u8);

        for (name, values) in headers.iter() {
            let name = name.as_bytes();
            if name.len() > MAX_NAME_LEN {
                return Err(ProtocolError::HeaderNameTooLong {
                    len: name.len(),
                    max: MAX_NAME_LEN,
                });
            }
            let json = serde_json::to_vec(values)?;
            let json_len = u32::try_from(json.len())
                .map_err(|_| ProtocolError::ValuesTooLong { len: json.len() })?;

            #[allow(clippy::cast_possible_truncation)]
            self.buffer.push(name.len() as u8);
            self.buffer.extend_from_slice(name);
            self.buffer.extend_from_slice(&json_len.to_be_bytes());
            self.buffer.extend_from_slice(&json);
        }

        self.buffer.extend_from_slice(message.payload());
        Ok(())
    }

    /// Decodes a complete frame.
    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        let mut reader = Reader { bytes, offset: 0 };

        let marker = reader.take(1)?[0];
        if marker != FRAME_MARKER {
            return Err(ProtocolError::InvalidMarker(marker));
        }

        let count = reader.take(1)?[0];
        let mut wire = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name_len = reader.take(1)?[0];
            let name = String::from_utf8(reader.take(usize::from(name_len))?.to_vec())?;

            let len_bytes = reader.take(4)?;
            let json_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
            let values: Vec<String> = serde_json::from_slice(reader.take(json_len as usize)?)?;
            wire.push((name, values));
        }

        let headers = HeaderMap::from_wire_form(wire)?;
        Ok(Message::new(headers, bytes::Bytes::copy_from_slice(reader.rest())))
    }

    /// Returns the internal buffer for inspection.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ProtocolError::Truncated {
                offset: self.offset,
                needed: n,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }
}
