//! Replay Server – lists session recordings and serves their bytes.
//!
//! This binary:
//! 1. Reads configuration from `replay.conf` (defaults if absent)
//! 2. Runs an axum HTTP server exposing the recordings directory to the
//!    player.

mod scan;
mod server;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use replay_common::config::{self, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── load config ──────────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| Config::default_path().to_string());
    let config =
        config::load_or_default(&PathBuf::from(&config_path)).context("Config load failed")?;

    info!("Replay Server starting (listen={})", config.listen_addr);

    if !config.recordings_dir.is_dir() {
        warn!(
            "Recordings directory {} does not exist yet",
            config.recordings_dir.display()
        );
    }

    // ── ctrl-c ───────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::Relaxed);
        info!("Shutdown signal received");
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── HTTP server ──────────────────────────────────────────────────
    if let Err(e) = server::run(&config, shutdown).await {
        tracing::error!("HTTP server error: {e:#}");
        return Err(e);
    }

    info!("Replay Server stopped");
    Ok(())
}
