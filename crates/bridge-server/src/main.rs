use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vmbridge_core::logging::{log_welcome, setup_logging};
use vmbridge_core::BridgeConfig;
use vmbridge_server::{create_router, AppState};

/// Voicemail bridge webhook server
#[derive(Parser, Debug)]
#[command(name = "vmbridge", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "VMBRIDGE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Run a single pending-queue flush and exit
    #[arg(long)]
    flush_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BridgeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    setup_logging(&config.logging)?;
    log_welcome("vmbridge", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config).await?;

    if cli.flush_once {
        let report = state.flusher.flush_pending().await;
        info!(?report, "Flushed pending voicemails");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let flusher = config
        .flush
        .interval()
        .map(|interval| state.flusher.clone().spawn_periodic(interval, shutdown.clone()));

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("Starting server on {}...", listener.local_addr()?);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                }
                _ = server_shutdown.cancelled() => {}
            }
            info!("Shutting down");
        })
        .await?;

    // Recordings already acknowledged must still be delivered or queued.
    let drain_limit = config
        .delivery
        .deadline()
        .map(|deadline| deadline + config.platform.request_timeout());
    state.drain_deliveries(drain_limit).await;

    shutdown.cancel();
    if let Some(handle) = flusher {
        let _ = handle.await;
    }
    Ok(())
}
