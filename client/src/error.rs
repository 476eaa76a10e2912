//! Acquisition failures.
//!
//! The rendered `Display` text is what ends up in view state; callers never
//! see the variants through `error_message`.

use thiserror::Error;

/// Shown when a failure carries no message of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred while loading the recording.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("No URL specified. Use /remote?url=<url> to specify a remote recording.")]
    MissingUrl,

    /// Remote download failure; the message may be empty.
    #[error("{0}")]
    Download(String),

    // ── listing ──────────────────────────────────────────────────────
    #[error("Recordings directory not found")]
    DirectoryNotFound,
    #[error("Permission denied to access recordings directory")]
    DirectoryForbidden,
    /// `error` field of the listing payload, verbatim.
    #[error("{0}")]
    Server(String),
    #[error("Failed to list server recordings")]
    ListFailed,

    // ── file loading ─────────────────────────────────────────────────
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Permission denied to access file")]
    FileForbidden,
    #[error("Failed to load file from server")]
    LoadFailed,
}

impl AcquireError {
    /// The message shown to the user, falling back to the generic text when
    /// the failure carried none.
    pub fn user_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            msg
        }
    }
}
