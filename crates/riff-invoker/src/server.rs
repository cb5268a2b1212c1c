//! Invoker server: the HTTP endpoint and the invocation stream side by side.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapter::FunctionAdapter;
use crate::config::InvokerConfig;
use crate::error::InvokerError;
use crate::grpc::InvocationService;

/// Run the invoker on the configured addresses until `cancel` fires.
pub async fn run(
    config: InvokerConfig,
    adapter: Arc<dyn FunctionAdapter>,
    cancel: CancellationToken,
) -> Result<(), InvokerError> {
    let http_listener = TcpListener::bind(config.server.http_address).await?;
    let grpc_listener = TcpListener::bind(config.server.grpc_address).await?;

    serve(http_listener, grpc_listener, config, adapter, cancel).await
}

/// Run the invoker on already bound listeners until `cancel` fires.
///
/// Open calls are told the invoker is shutting down; connections still open
/// after `server.shutdown_timeout` are abandoned.
pub async fn serve(
    http_listener: TcpListener,
    grpc_listener: TcpListener,
    config: InvokerConfig,
    adapter: Arc<dyn FunctionAdapter>,
    cancel: CancellationToken,
) -> Result<(), InvokerError> {
    tracing::info!(
        http_address = %http_listener.local_addr()?,
        grpc_address = %grpc_listener.local_addr()?,
        "Invoker listening"
    );

    let app = crate::http::router(Arc::clone(&adapter), &config.limits);
    let service = InvocationService::new(adapter, config.grpc.clone(), cancel.clone());

    let http = tokio::spawn(crate::http::serve(http_listener, app, cancel.clone()));
    let grpc = tokio::spawn(crate::grpc::serve(grpc_listener, service, cancel.clone()));
    let aborts = [http.abort_handle(), grpc.abort_handle()];

    let servers = async { tokio::try_join!(flatten(http), flatten(grpc)) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            // A server only returns early when it failed; take the other down too.
            cancel.cancel();
            result?;
            return Ok(());
        }
        () = cancel.cancelled() => {}
    }

    let shutdown_timeout = config.server.shutdown_timeout;
    match tokio::time::timeout(shutdown_timeout, servers).await {
        Ok(result) => {
            result?;
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = shutdown_timeout.as_millis(),
                "Shutdown timeout elapsed, abandoning open connections"
            );
            for abort in &aborts {
                abort.abort();
            }
        }
    }

    tracing::info!("Invoker shutdown complete");
    Ok(())
}

async fn flatten(handle: JoinHandle<Result<(), InvokerError>>) -> Result<(), InvokerError> {
    handle.await.map_err(std::io::Error::other)?
}
