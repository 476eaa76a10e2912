//! HTTP server exposing session recordings to the player.
//!
//! Routes:
//!   GET  /api/health               → health check
//!   GET  /api/list-files[?dir=]    → list recordings (alias: /list-files)
//!   GET  /recordings/<path>        → download a recording

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use replay_common::config::Config;
use replay_common::protocol::{HealthResponse, ListFilesResponse};

use crate::scan::{self, ScanOptions};

/// Shared state for route handlers.
#[derive(Clone)]
struct AppState {
    recordings_dir: PathBuf,
    base_dir: PathBuf,
    scan: ScanOptions,
    start_time: Instant,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    dir: Option<String>,
}

/// Build the router for `config`.
pub fn router(config: &Config) -> Router {
    let state = AppState {
        recordings_dir: config.recordings_dir.clone(),
        base_dir: config.recordings_base_dir.clone(),
        scan: ScanOptions {
            extensions: config.recording_extensions.clone(),
            min_size: config.min_recording_size,
        },
        start_time: Instant::now(),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/list-files", get(list_files))
        .route("/list-files", get(list_files))
        .nest_service("/recordings", ServeDir::new(&config.recordings_base_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server. Blocks until shutdown.
pub async fn run(config: &Config, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let app = router(config);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Replay server listening on {}", config.listen_addr);
    info!("Recordings directory: {}", config.recordings_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}

// ── route handlers ───────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> (StatusCode, Json<ListFilesResponse>) {
    let directory = match query.dir.as_deref().filter(|d| !d.is_empty()) {
        Some(requested) => match resolve_dir(&state.base_dir, requested) {
            Some(dir) => dir,
            None => {
                debug!("Rejected directory outside recordings root: {requested}");
                return (
                    StatusCode::FORBIDDEN,
                    Json(ListFilesResponse {
                        recordings: Some(vec![]),
                        ..Default::default()
                    }),
                );
            }
        },
        None => state.recordings_dir.clone(),
    };

    if !directory.is_dir() {
        return (
            StatusCode::NOT_FOUND,
            Json(ListFilesResponse {
                error: Some(format!("Directory not found: {}", directory.display())),
                recordings: Some(vec![]),
                ..Default::default()
            }),
        );
    }

    let base = state.base_dir.clone();
    let opts = state.scan.clone();
    let dir = directory.clone();
    let recordings =
        match tokio::task::spawn_blocking(move || scan::list_recordings(&dir, &base, &opts)).await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Directory scan failed: {e}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ListFilesResponse::default()),
                );
            }
        };

    (
        StatusCode::OK,
        Json(ListFilesResponse {
            directory: Some(directory.display().to_string()),
            count: Some(recordings.len()),
            recordings: Some(recordings),
            error: None,
        }),
    )
}

/// Resolve a requested directory below `base`, refusing `..` components.
fn resolve_dir(base: &Path, requested: &str) -> Option<PathBuf> {
    let rel = Path::new(requested.trim_start_matches('/'));
    if rel.components().any(|c| matches!(c, Component::ParentDir)) {
        return None;
    }
    Some(base.join(rel))
}
