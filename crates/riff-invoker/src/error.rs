//! Invoker error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid message header: {0}")]
    Header(#[from] riff_proto::HeaderError),

    /// The function failed; the message is passed through uninterpreted.
    #[error("Function failed: {0}")]
    Adapter(#[from] AdapterError),

    /// The peer ended the call with an error status, or the stream broke.
    #[error("Stream error: {0}")]
    Stream(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Call cancelled")]
    Cancelled,

    #[error("Call already closed for sending")]
    SendClosed,

    /// A previous receive already reported why the call failed.
    #[error("Call already failed")]
    CallFailed,

    #[error("Connection timeout after {0} attempts")]
    ConnectTimeout(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InvokerError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Header(_) => "invalid_header",
            Self::Adapter(_) => "adapter_error",
            Self::Stream(_) => "stream_error",
            Self::Transport(_) => "transport_error",
            Self::Cancelled => "cancelled",
            Self::SendClosed => "send_closed",
            Self::CallFailed => "call_failed",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Io(_) => "io_error",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Header(_) => StatusCode::BAD_REQUEST,
            Self::Adapter(AdapterError::Timeout(_)) | Self::ConnectTimeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Stream(_) | Self::Transport(_) | Self::CallFailed => StatusCode::BAD_GATEWAY,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Adapter(_) | Self::Config(_) | Self::SendClosed | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for InvokerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Function output is the caller's business; invoker internals are not.
        let message = match &self {
            Self::Header(err) => format!("Invalid message header: {err}"),
            Self::Adapter(AdapterError::Timeout(_)) | Self::ConnectTimeout(_) => {
                "Request timeout".to_owned()
            }
            Self::Adapter(err) => format!("Function failed: {err}"),
            Self::Cancelled => "Service shutting down".to_owned(),
            Self::Config(_)
            | Self::Stream(_)
            | Self::Transport(_)
            | Self::SendClosed
            | Self::CallFailed
            | Self::Io(_) => "Internal server error".to_owned(),
        };

        (status, message).into_response()
    }
}

impl From<InvokerError> for tonic::Status {
    fn from(err: InvokerError) -> Self {
        match err {
            InvokerError::Stream(status) => status,
            InvokerError::Header(err) => Self::invalid_argument(err.to_string()),
            InvokerError::Adapter(err) => Self::internal(err.to_string()),
            InvokerError::Cancelled => Self::unavailable("invoker shutting down"),
            InvokerError::ConnectTimeout(_) => Self::deadline_exceeded(err.to_string()),
            InvokerError::Config(_)
            | InvokerError::Transport(_)
            | InvokerError::SendClosed
            | InvokerError::CallFailed
            | InvokerError::Io(_) => Self::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            InvokerError::Header(riff_proto::HeaderError::InvalidHeaderName(String::new()))
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InvokerError::Adapter(AdapterError::Timeout(Duration::from_secs(1))).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            InvokerError::Adapter(AdapterError::Failed("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            InvokerError::Stream(tonic::Status::unavailable("gone")).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn error_types() {
        assert_eq!(InvokerError::Cancelled.error_type(), "cancelled");
        assert_eq!(
            InvokerError::Adapter(AdapterError::Failed("x".into())).error_type(),
            "adapter_error"
        );
    }

    #[test]
    fn grpc_status_mapping() {
        let status = tonic::Status::from(InvokerError::Adapter(AdapterError::Failed(
            "division by zero".into(),
        )));
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(status.message().contains("division by zero"));

        let status = tonic::Status::from(InvokerError::Header(
            riff_proto::HeaderError::InvalidHeaderName(String::new()),
        ));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = tonic::Status::from(InvokerError::Cancelled);
        assert_eq!(status.code(), tonic::Code::Unavailable);

        let original = tonic::Status::not_found("nope");
        let status = tonic::Status::from(InvokerError::Stream(original));
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
