//! Replay client – acquires a recording the way the player does.
//!
//! Usage: `replay-client [route] [config]`
//!
//! * `/remote?url=<encoded url>` downloads that recording and reports the
//!   outcome.
//! * Any other route lists the replay server's recordings and keeps the list
//!   fresh until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use replay_client::file_list::{FileListNotice, FileListOptions, FileListState, ServerFileList};
use replay_client::{Acquisition, EventBus, Mode, RemoteFetcher, Route, ServerFileService};
use replay_common::config::{self, Config};
use replay_common::format::{format_date, format_file_size};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let route = Route::parse(&args.next().unwrap_or_else(|| "/".to_string()));

    // ── load config ──────────────────────────────────────────────────
    let config_path = args
        .next()
        .unwrap_or_else(|| Config::default_path().to_string());
    let config =
        config::load_or_default(&PathBuf::from(&config_path)).context("Config load failed")?;

    info!("Replay client starting (server={})", config.server_url);

    let client = replay_client::http::build_client(&config)?;
    let events = EventBus::new();
    let fetcher = RemoteFetcher::new(client.clone()).with_base(&config.server_url);
    let acquisition = Acquisition::new(Arc::new(fetcher), &events);

    match route.mode() {
        Mode::Remote => run_remote(&acquisition, &route).await,
        Mode::Local => run_local(&acquisition, client, &config).await,
    }
}

async fn run_remote(acquisition: &Acquisition, route: &Route) -> Result<()> {
    acquisition.initialize(route).await;

    let state = acquisition.snapshot();
    match (&state.selected, &state.error_message) {
        (Some(recording), _) => {
            info!("Selected {recording}");
            Ok(())
        }
        (None, Some(msg)) => anyhow::bail!("{msg}"),
        (None, None) => anyhow::bail!("No recording selected"),
    }
}

async fn run_local(
    acquisition: &Acquisition,
    client: reqwest::Client,
    config: &Config,
) -> Result<()> {
    acquisition.initialize(&Route::parse("/")).await;

    let service = ServerFileService::new(client, &config.server_url);
    let mut list = ServerFileList::new(Arc::new(service), FileListOptions::from(config))
        .with_selector(acquisition.selector());
    let mut state_rx = list.watch();
    let mut notices = list.notices();

    list.open().await;
    let mut shown = list.snapshot();
    report(&shown);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                let differs = state.error != shown.error || state.recordings != shown.recordings;
                if !state.loading && differs {
                    report(&state);
                    shown = state;
                }
            }
            notice = notices.recv() => match notice {
                Ok(FileListNotice::NewRecordings { added, total }) => {
                    info!("{added} new recording(s), {total} total");
                }
                Err(RecvError::Lagged(n)) => warn!("Missed {n} notice(s)"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Releases the refresh timer.
    drop(list);
    info!("Replay client stopped");
    Ok(())
}

fn report(state: &FileListState) {
    if state.error {
        error!(
            "{}",
            state.error_message.as_deref().unwrap_or("Unknown error")
        );
        return;
    }
    info!("{} recording(s) on server", state.recordings_count);
    for rec in &state.recordings {
        info!(
            "  {:<40} {:>10}  {}",
            rec.path,
            format_file_size(rec.size),
            format_date(rec.modified)
        );
    }
}
