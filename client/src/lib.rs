//! Recording acquisition for the session-recording player.
//!
//! Decides which recording is active, loads it from a remote URL or from the
//! replay server's listing, and publishes loading/error/selection state for
//! the playback side to observe.

pub mod acquisition;
pub mod error;
pub mod events;
pub mod file_list;
pub mod http;
pub mod remote;
pub mod route;
pub mod service;

#[cfg(test)]
mod testutil;

pub use acquisition::{Acquisition, AcquisitionState, PendingLoad, Selector};
pub use error::AcquireError;
pub use events::{EventBus, PlayerEvent};
pub use file_list::{FileListNotice, FileListOptions, FileListState, ServerFileList};
pub use remote::{RemoteFetch, RemoteFetcher};
pub use route::{Mode, Route};
pub use service::{RecordingCatalog, ServerFileService};
