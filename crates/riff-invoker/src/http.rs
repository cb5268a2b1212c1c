//! Plain HTTP adapter in front of the function.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use riff_proto::{HeaderMap, Message};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::FunctionAdapter;
use crate::config::LimitsConfig;
use crate::error::InvokerError;
use crate::middleware::TraceLayer;

/// Shared HTTP state.
#[derive(Debug, Clone)]
pub struct HttpState {
    adapter: Arc<dyn FunctionAdapter>,
}

/// Builds the HTTP router.
///
/// `POST /` invokes the function with the request body as payload and
/// returns the first reply's payload as `text/plain`.
pub fn router(adapter: Arc<dyn FunctionAdapter>, limits: &LimitsConfig) -> Router {
    Router::new()
        .route("/", post(invoke))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(limits.max_body_size))
        .layer(TraceLayer::new())
        .with_state(HttpState { adapter })
}

/// Serves `app` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), InvokerError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Handle function invocation.
async fn invoke(State(state): State<HttpState>, body: Bytes) -> Result<Response, InvokerError> {
    let message = Message::new(HeaderMap::new(), body);
    let outputs = state.adapter.invoke(message).await?;
    debug!(outputs = outputs.len(), "Function returned");

    let payload = outputs
        .into_iter()
        .next()
        .map(|reply| reply.into_parts().1)
        .unwrap_or_default();

    Ok(([(CONTENT_TYPE, "text/plain")], payload).into_response())
}
