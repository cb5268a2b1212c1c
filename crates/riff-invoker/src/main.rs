//! riff invoker binary.
//!
//! Runs the configured function command behind the invocation stream and
//! the plain HTTP endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use riff_invoker::{run, CommandAdapter, InvokerConfig};

#[derive(Parser, Debug)]
#[command(name = "riff-invoker", version, about = "Host a function for riff")]
struct Cli {
    /// Configuration file (defaults to riff.toml when present).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug,h2=info,hyper=info,tower=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("riff invoker starting");

    let config = InvokerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let adapter = CommandAdapter::from_config(&config.function)
        .context("configuring function command")?;

    info!(
        http_address = %config.server.http_address,
        grpc_address = %config.server.grpc_address,
        command = ?config.function.command,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();

    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    if let Err(e) = run(config, Arc::new(adapter), cancel).await {
        error!(error = %e, error_type = e.error_type(), "Invoker error");
        return Err(e.into());
    }

    info!("Invoker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}
