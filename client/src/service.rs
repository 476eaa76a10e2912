//! Access to recordings published by the replay server.
//!
//! Endpoints:
//!   GET /api/list-files[?dir=<path>]  → `ListFilesResponse`
//!   GET /recordings<path>             → raw recording bytes

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use replay_common::protocol::{ListFilesResponse, RecordingDescriptor};
use replay_common::recording::{RecordingHandle, OCTET_STREAM};

use crate::error::AcquireError;

const LIST_ENDPOINT: &str = "/api/list-files";
const RECORDINGS_PREFIX: &str = "/recordings";

/// Directory listing plus single-file loading.
#[async_trait]
pub trait RecordingCatalog: Send + Sync {
    /// List recordings in `directory` (`None` = the server's default).
    ///
    /// Order is whatever the server returns.
    async fn list_recordings(
        &self,
        directory: Option<&str>,
    ) -> Result<Vec<RecordingDescriptor>, AcquireError>;

    /// Fetch one listed file. `path` is normalized to start with `/`.
    async fn load_file(&self, path: &str) -> Result<RecordingHandle, AcquireError>;
}

/// Make sure a listed path starts with a separator.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// [`RecordingCatalog`] backed by the replay server's HTTP API.
pub struct ServerFileService {
    client: reqwest::Client,
    base_url: String,
}

impl ServerFileService {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        ServerFileService {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn list_url(&self, directory: Option<&str>) -> Option<Url> {
        let mut url = Url::parse(&format!("{}{LIST_ENDPOINT}", self.base_url)).ok()?;
        if let Some(dir) = directory.filter(|d| !d.is_empty()) {
            url.query_pairs_mut().append_pair("dir", dir);
        }
        Some(url)
    }
}

#[async_trait]
impl RecordingCatalog for ServerFileService {
    async fn list_recordings(
        &self,
        directory: Option<&str>,
    ) -> Result<Vec<RecordingDescriptor>, AcquireError> {
        let Some(url) = self.list_url(directory) else {
            warn!("Invalid server URL: {}", self.base_url);
            return Err(AcquireError::ListFailed);
        };

        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("GET {LIST_ENDPOINT} failed: {e}");
                return Err(AcquireError::ListFailed);
            }
        };
        let status = resp.status();

        // A body that is not JSON at all is treated like a missing one.
        let body = match resp.bytes().await {
            Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes).ok(),
            Err(e) => {
                debug!("Reading {LIST_ENDPOINT} body failed: {e}");
                None
            }
        };

        // A server-supplied message wins over any status mapping.
        let message = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(|e| e.as_str())
            .filter(|m| !m.is_empty());
        if let Some(msg) = message {
            return Err(AcquireError::Server(msg.to_string()));
        }

        if status.is_success() {
            let Some(body) = body else {
                return Ok(Vec::new());
            };
            return match serde_json::from_value::<ListFilesResponse>(body) {
                Ok(listing) => Ok(listing.recordings.unwrap_or_default()),
                Err(e) => {
                    warn!("Malformed recordings listing: {e}");
                    Err(AcquireError::ListFailed)
                }
            };
        }

        debug!("GET {LIST_ENDPOINT} returned {status}");
        Err(match status {
            StatusCode::NOT_FOUND => AcquireError::DirectoryNotFound,
            StatusCode::FORBIDDEN => AcquireError::DirectoryForbidden,
            _ => AcquireError::ListFailed,
        })
    }

    async fn load_file(&self, path: &str) -> Result<RecordingHandle, AcquireError> {
        let path = normalize_path(path);
        let url = format!("{}{RECORDINGS_PREFIX}{path}", self.base_url);

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("GET {url} failed: {e}");
                return Err(AcquireError::LoadFailed);
            }
        };

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(AcquireError::FileNotFound(path)),
            StatusCode::FORBIDDEN => return Err(AcquireError::FileForbidden),
            s => {
                debug!("GET {url} returned {s}");
                return Err(AcquireError::LoadFailed);
            }
        }

        let bytes = resp.bytes().await.map_err(|e| {
            debug!("Reading {url} failed: {e}");
            AcquireError::LoadFailed
        })?;

        let name = path.rsplit('/').next().unwrap_or_default();
        Ok(RecordingHandle::new(name, bytes.to_vec()).with_mime_type(OCTET_STREAM))
    }
}
