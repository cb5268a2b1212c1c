//! Function invoker for riff.
//!
//! Hosts a function behind two transports:
//!
//! - the bidirectional `function.MessageFunction/Call` gRPC stream, where
//!   requests and replies flow independently ([`grpc`])
//! - a plain HTTP endpoint, `POST /`, for one-shot invocations ([`http`])
//!
//! The function itself sits behind the [`FunctionAdapter`] trait. The
//! [`client`] module is the dispatcher side of the stream.

pub mod adapter;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod http;
pub mod middleware;
pub mod server;

pub use adapter::{AdapterError, CommandAdapter, FnAdapter, FunctionAdapter};
pub use backoff::Backoff;
pub use client::{Call, CallState, InvocationClient};
pub use config::InvokerConfig;
pub use error::InvokerError;
pub use grpc::InvocationService;
pub use server::run;
