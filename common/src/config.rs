//! Configuration parsing – reads a `KEY=VALUE` file shared by the
//! recordings server and the player client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Application configuration, shared between server and client.
///
/// Both binaries load the same file; each ignores fields it does not need.
#[derive(Debug, Clone)]
pub struct Config {
    // ── client ───────────────────────────────────────────────────────
    /// Base URL the client uses to reach the recordings server.
    pub server_url: String,
    pub http_timeout_secs: u64,
    /// Whether the server file list starts with auto-refresh enabled.
    pub auto_refresh: bool,
    /// Auto-refresh period in milliseconds (always > 0).
    pub refresh_interval_ms: u64,

    // ── server ───────────────────────────────────────────────────────
    /// Address the listing server listens on.
    pub listen_addr: String,
    /// Directory listed when a request does not name one.
    pub recordings_dir: PathBuf,
    /// Root that listed paths are relative to and files are served from.
    pub recordings_base_dir: PathBuf,
    /// Extensions (with leading dot, lower-case) that mark a recording.
    pub recording_extensions: Vec<String>,
    /// Extensionless files smaller than this are not treated as recordings.
    pub min_recording_size: u64,
}

impl Config {
    /// Default config path.
    pub fn default_path() -> &'static str {
        "/etc/replay/replay.conf"
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn from_map(map: &HashMap<String, String>) -> Config {
        let get = |key: &str| -> Option<String> { map.get(key).cloned().filter(|v| !v.is_empty()) };
        let get_u64 = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        let refresh_interval_ms = match get_u64("REFRESH_INTERVAL_MS", 30_000) {
            0 => {
                warn!("REFRESH_INTERVAL_MS must be positive – using 30000");
                30_000
            }
            ms => ms,
        };

        let recordings_dir =
            PathBuf::from(get("RECORDINGS_DIR").unwrap_or_else(|| "/recordings".into()));
        let recordings_base_dir = get("RECORDINGS_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| recordings_dir.clone());

        let recording_extensions = get("RECORDING_EXTENSIONS")
            .unwrap_or_else(|| ".guac,.cast".into())
            .split(',')
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
            .collect();

        Config {
            server_url: get("SERVER_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8888".into())
                .trim_end_matches('/')
                .to_string(),
            http_timeout_secs: get_u64("HTTP_TIMEOUT_SECS", 30),
            auto_refresh: get("AUTO_REFRESH")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            refresh_interval_ms,

            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:8888".into()),
            recordings_dir,
            recordings_base_dir,
            recording_extensions,
            min_recording_size: get_u64("MIN_RECORDING_SIZE", 50),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from_map(&HashMap::new())
    }
}

/// Parse a `KEY=VALUE` configuration file.
///
/// Lines starting with `#` are comments.  Values may be optionally
/// double-quoted.  Unknown keys are silently ignored.
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let map = parse_conf(&text);
    info!("Loaded config from {}", path.display());
    Ok(Config::from_map(&map))
}

/// Like [`load`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config at {} – using defaults", path.display());
        return Ok(Config::default());
    }
    load(path)
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

// ─── tests ───────────────────────────────────────────────────────────────
