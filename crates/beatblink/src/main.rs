//! Beat & Blink server
//!
//! Runs the broadcast hub and serves the REST API and `/ws` WebSocket until
//! Ctrl-C.

use anyhow::{Context, Result};
use beatblink::{cli::ServerOpts, logging_setup, AppConfig};
use beatblink_control::{Hub, WebServer};
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let opts = ServerOpts::parse();

    let mut config = AppConfig::load_or_default(opts.config.as_deref())?;
    opts.apply(&mut config);
    config.validate()?;

    let _log_guard = logging_setup::init(&config.logging)?;
    info!("Beat & Blink {} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &opts.config {
        info!("Configuration loaded from {:?}", path);
    }

    let (hub, hub_task) = Hub::spawn(config.audio.clone(), config.hub.clone());

    let shutdown_hub = hub.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
        // Closes every WebSocket so the server can drain
        if let Err(e) = shutdown_hub.shutdown().await {
            warn!("Hub already stopped: {}", e);
        }
    };

    WebServer::new(config.server.clone(), hub.clone())
        .run(shutdown)
        .await
        .context("Web server failed")?;

    drop(hub);
    hub_task.await.context("Hub task failed")?;
    info!("Beat & Blink stopped");
    Ok(())
}
