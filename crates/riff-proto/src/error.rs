//! Error types for the header model and the wire protocol.

use thiserror::Error;

/// Errors raised while building or querying header maps.
///
/// Header operations are all-or-nothing: when one of these is returned no
/// new map has been produced and the receiver is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Header name is empty or contains ASCII control characters.
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// An add or replace was given no values, which would leave an empty slot.
    #[error("header {0:?} given no values")]
    NoValues(String),

    /// A mandatory header has no slot.
    #[error("missing header: {0}")]
    MissingHeader(String),
}

impl HeaderError {
    /// Stable identifier for logs and status details.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidHeaderName(_) => "invalid_header_name",
            Self::NoValues(_) => "no_values",
            Self::MissingHeader(_) => "missing_header",
        }
    }
}

/// Errors raised by the framed byte codec.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame does not start with the `0xFF` marker.
    #[error("invalid frame marker: {0:#04x}")]
    InvalidMarker(u8),

    /// Frame ended before the announced content.
    #[error("truncated frame: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// The frame format cannot represent this many headers.
    #[error("too many headers: {count} (max {max})")]
    TooManyHeaders { count: usize, max: usize },

    /// The frame format cannot represent a header name this long.
    #[error("header name too long: {len} bytes (max {max})")]
    HeaderNameTooLong { len: usize, max: usize },

    /// Encoded values of one header exceed the 32-bit length prefix.
    #[error("header values too long: {len} bytes")]
    ValuesTooLong { len: usize },

    /// Header name bytes are not valid UTF-8.
    #[error("header name is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Header values are not a JSON array of strings.
    #[error("malformed header values: {0}")]
    MalformedValues(#[from] serde_json::Error),

    /// Decoded headers violate the header model.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_error_types() {
        assert_eq!(
            HeaderError::InvalidHeaderName(String::new()).error_type(),
            "invalid_header_name"
        );
        assert_eq!(
            HeaderError::MissingHeader("Accept".into()).error_type(),
            "missing_header"
        );
        assert_eq!(HeaderError::NoValues("X".into()).error_type(), "no_values");
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::Truncated {
            offset: 3,
            needed: 4,
        };
        assert_eq!(err.to_string(), "truncated frame: needed 4 bytes at offset 3");
        assert_eq!(
            ProtocolError::InvalidMarker(0x01).to_string(),
            "invalid frame marker: 0x01"
        );
    }
}
