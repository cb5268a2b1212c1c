//! Request tracing layer for the HTTP endpoint.

use http::{Request, Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

/// Tower layer that runs each request inside an `http.server.request` span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceLayer;

impl TraceLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

/// The service wrapper that opens the request span.
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // Skip tracing for health endpoints
        if req.uri().path() == "/health" {
            return Box::pin(async move { inner.call(req).await });
        }

        let span = tracing::info_span!(
            "http.server.request",
            http.request.method = %req.method(),
            url.path = %req.uri().path(),
            http.response.status_code = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let response = inner.call(req).await;

                let span = tracing::Span::current();
                span.record(
                    "duration_ms",
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                );
                if let Ok(ref resp) = response {
                    let status = resp.status();
                    span.record("http.response.status_code", status.as_u16());
                    if status.is_server_error() {
                        tracing::warn!(status = status.as_u16(), "Request failed");
                    } else {
                        tracing::debug!(status = status.as_u16(), "Request handled");
                    }
                }

                response
            }
            .instrument(span),
        )
    }
}
