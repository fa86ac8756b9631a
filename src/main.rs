//! Docvault Gateway - resume and document upload service

use clap::Parser;
use docvault_gateway::metrics::server::MetricsServer;
use docvault_gateway::secrets::SecretStore;
use docvault_gateway::{config::Config, logging, AppState, Server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Docvault Gateway - S3 upload gateway with presigned URLs
#[derive(Parser, Debug)]
#[command(name = "docvault-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(&args.log_level)?;

    info!("Starting Docvault Gateway v{}", docvault_gateway::VERSION);

    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let mut metrics_server = MetricsServer::from_config(&config.metrics);
    if let Some(server) = metrics_server.as_mut() {
        server.start().await?;
    }

    let state = Arc::new(AppState::from_config(&config).await?);
    watch_secret_rotation(Arc::clone(&state.secrets));

    let server = Server::bind(&config.server.address, state).await?;
    server.run_until(shutdown_signal()).await;

    if let Some(server) = metrics_server.as_mut() {
        server.shutdown().await;
    }
    info!("Shutdown complete");
    Ok(())
}

/// Drop the secret cache on SIGHUP so rotated values are picked up
#[cfg(unix)]
fn watch_secret_rotation(secrets: Arc<SecretStore>) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::hangup()) {
        Ok(mut hangup) => {
            tokio::spawn(async move {
                while hangup.recv().await.is_some() {
                    info!("SIGHUP received");
                    secrets.invalidate();
                }
            });
        }
        Err(e) => warn!(error = %e, "SIGHUP handler unavailable, secret cache cannot be reloaded"),
    }
}

#[cfg(not(unix))]
fn watch_secret_rotation(_secrets: Arc<SecretStore>) {}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down server");
}
