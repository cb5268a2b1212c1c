//! Message model and wire protocol for riff function invocation.
//!
//! This crate provides:
//!
//! - [`HeaderMap`], an immutable, case-insensitive, multi-valued header map
//! - [`Message`] and [`MessageBuilder`], the unit exchanged with a function
//! - [`pb`] and [`service`], the protobuf types and gRPC stubs for the
//!   `function.MessageFunction/Call` bidirectional stream
//! - [`codec`], a framed byte encoding for byte-oriented transports
//!
//! # Example
//!
//! ```
//! use riff_proto::{Message, MessageBuilder};
//!
//! let message: Message = MessageBuilder::new()
//!     .add_header("Content-Type", ["text/plain"])?
//!     .add_header("X-Attempt", [1])?
//!     .payload("hello")
//!     .build();
//!
//! assert_eq!(message.headers().get_value("content-type"), Some("text/plain"));
//! assert_eq!(message.headers().get_value("x-attempt"), Some("1"));
//! # Ok::<(), riff_proto::HeaderError>(())
//! ```

pub mod codec;
mod error;
mod headers;
mod message;
pub mod pb;
pub mod service;
mod value;

pub use codec::{Codec, FRAME_MARKER, MAX_HEADERS, MAX_NAME_LEN};
pub use error::{HeaderError, ProtocolError};
pub use headers::HeaderMap;
pub use message::{Message, MessageBuilder};
pub use value::IntoHeaderValue;

/// Well-known header names.
pub mod header {
    /// Media type of the payload.
    pub const CONTENT_TYPE: &str = "Content-Type";
}
