//! Remote fetcher – downloads a single recording from an arbitrary URL.
//!
//! Exactly one GET per call: no retry, no caching.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

use replay_common::recording::RecordingHandle;

use crate::error::AcquireError;

/// Name given to downloads whose URL has no usable final segment.
const FALLBACK_NAME: &str = "recording";

#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn download(&self, url: &str) -> Result<RecordingHandle, AcquireError>;
}

/// [`RemoteFetch`] over HTTP.
pub struct RemoteFetcher {
    client: reqwest::Client,
    /// Base for relative URLs.
    base: Option<Url>,
}

impl RemoteFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        RemoteFetcher { client, base: None }
    }

    /// Resolve relative URLs against `base` (normally the server URL).
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Url::parse(&format!("{}/", base.trim_end_matches('/'))).ok();
        self
    }

    fn resolve(&self, url: &str) -> Result<Url, AcquireError> {
        match Url::parse(url) {
            Ok(u) => Ok(u),
            Err(_) => self
                .base
                .as_ref()
                .and_then(|b| b.join(url).ok())
                .ok_or_else(|| AcquireError::Download(format!("Invalid recording URL: {url}"))),
        }
    }
}

#[async_trait]
impl RemoteFetch for RemoteFetcher {
    async fn download(&self, url: &str) -> Result<RecordingHandle, AcquireError> {
        let target = self.resolve(url)?;
        debug!("Downloading remote recording {target}");

        let resp = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| AcquireError::Download(format!("Failed to download {target}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AcquireError::Download(format!(
                "Failed to download {target}: HTTP {status}"
            )));
        }

        let mime_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AcquireError::Download(format!("Failed to download {target}: {e}")))?;
        if bytes.is_empty() {
            return Err(AcquireError::Download(format!(
                "Remote recording is empty: {target}"
            )));
        }

        let mut handle = RecordingHandle::new(file_name(&target), bytes.to_vec());
        handle.mime_type = mime_type;
        Ok(handle)
    }
}

/// Final non-empty path segment of `url`.
fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}
