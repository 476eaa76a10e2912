//! Shared HTTP protocol types for communication between the recordings
//! server and the player client.

use serde::{Deserialize, Serialize};

/// Metadata about a single recording reported by the listing endpoint.
///
/// A descriptor is an immutable snapshot taken by one listing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingDescriptor {
    /// Path relative to the recordings root, normally with a leading `/`.
    pub path: String,
    /// Display name, relative to the listed directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    #[serde(default)]
    pub modified: f64,
}

/// Body of `GET /api/list-files`.
///
/// Every field is optional on the wire: an error response may carry only
/// `error`, and a successful one may omit `recordings` entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recordings: Option<Vec<RecordingDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health-check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}
