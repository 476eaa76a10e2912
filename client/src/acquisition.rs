//! Acquisition orchestrator – decides where the active recording comes from
//! and publishes the unified loading/error/selection state.
//!
//! State is published on a `watch` channel; lifecycle signals from the
//! playback engine arrive on the session's [`EventBus`].  Every acquisition
//! takes a new generation number, and a response whose generation is no
//! longer current is dropped instead of overwriting a newer selection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use replay_common::recording::RecordingHandle;

use crate::error::{AcquireError, DEFAULT_ERROR_MESSAGE};
use crate::events::{EventBus, PlayerEvent};
use crate::remote::RemoteFetch;
use crate::route::{Mode, Route};

/// Observable acquisition state.
///
/// `error` implies `selected.is_none()`; `loading` and `downloading` are
/// never both set.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionState {
    pub mode: Mode,
    /// A server file is being loaded.
    pub loading: bool,
    /// A remote file is being downloaded.
    pub downloading: bool,
    pub playing: bool,
    pub error: bool,
    pub error_message: Option<String>,
    pub selected: Option<Arc<RecordingHandle>>,
}

struct Shared {
    state: watch::Sender<AcquisitionState>,
    generation: AtomicU64,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply_event(&self, event: &PlayerEvent) {
        self.state.send_modify(|s| match event {
            PlayerEvent::LoadingStarted => {
                s.error = false;
                s.error_message = None;
            }
            PlayerEvent::Error(msg) => {
                s.selected = None;
                s.error = true;
                s.error_message = Some(
                    msg.clone()
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
                );
            }
            PlayerEvent::Playing => s.playing = true,
            PlayerEvent::Paused => s.playing = false,
        });
    }
}

/// Handle through which other components assign the selected recording.
///
/// Cloned out of an [`Acquisition`]; the local file picker and the server
/// file list both select through it.
#[derive(Clone)]
pub struct Selector {
    shared: Arc<Shared>,
}

impl Selector {
    /// Select a recording directly (local file picker).
    pub fn select(&self, handle: RecordingHandle) {
        self.shared.next_generation();
        info!("Recording selected: {handle}");
        let handle = Arc::new(handle);
        self.shared.state.send_modify(|s| {
            s.selected = Some(handle);
            s.loading = false;
            s.downloading = false;
            s.error = false;
            s.error_message = None;
        });
    }

    /// Start a server load. Finish it with [`PendingLoad::complete`];
    /// dropping it instead gives up without touching the selection.
    pub fn begin_load(&self) -> PendingLoad {
        PendingLoad::begin(Arc::clone(&self.shared), Busy::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Busy {
    Loading,
    Downloading,
}

/// An acquisition in flight.
///
/// Holds the generation it started with. When dropped while that generation
/// is still current, the busy flag it raised is cleared, so a cancelled load
/// never leaves the indicator stuck.
#[must_use = "dropping a PendingLoad abandons it"]
pub struct PendingLoad {
    shared: Arc<Shared>,
    generation: u64,
    busy: Busy,
}

impl PendingLoad {
    fn begin(shared: Arc<Shared>, busy: Busy) -> Self {
        let generation = shared.next_generation();
        shared.state.send_modify(|s| {
            s.loading = busy == Busy::Loading;
            s.downloading = busy == Busy::Downloading;
        });
        PendingLoad {
            shared,
            generation,
            busy,
        }
    }

    fn is_current(&self) -> bool {
        self.shared.is_current(self.generation)
    }

    /// Select `handle`. Returns `false` when a newer acquisition has started
    /// in the meantime, in which case nothing changes.
    pub fn complete(self, handle: Arc<RecordingHandle>) -> bool {
        if !self.is_current() {
            debug!("Discarding stale load of {}", handle.name);
            return false;
        }
        self.shared.state.send_modify(|s| {
            s.selected = Some(handle);
            s.loading = false;
            s.downloading = false;
            s.error = false;
            s.error_message = None;
        });
        true
    }
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        if !self.is_current() {
            return;
        }
        let busy = self.busy;
        self.shared.state.send_if_modified(|s| match busy {
            Busy::Loading => std::mem::take(&mut s.loading),
            Busy::Downloading => std::mem::take(&mut s.downloading),
        });
    }
}

/// Top-level acquisition session.
///
/// Must be created inside a Tokio runtime: it spawns the task that listens
/// for lifecycle signals, which is aborted when the session is dropped.
pub struct Acquisition {
    shared: Arc<Shared>,
    fetcher: Arc<dyn RemoteFetch>,
    listener: JoinHandle<()>,
}

impl Acquisition {
    pub fn new(fetcher: Arc<dyn RemoteFetch>, events: &EventBus) -> Self {
        let (state, _) = watch::channel(AcquisitionState::default());
        let shared = Arc::new(Shared {
            state,
            generation: AtomicU64::new(0),
        });

        let listener = tokio::spawn(listen(Arc::clone(&shared), events.subscribe()));

        Acquisition {
            shared,
            fetcher,
            listener,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<AcquisitionState> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> AcquisitionState {
        self.shared.state.borrow().clone()
    }

    /// Apply a lifecycle signal. Applying the same signal twice is the same
    /// as applying it once.
    pub fn apply_event(&self, event: &PlayerEvent) {
        self.shared.apply_event(event);
    }

    /// Inspect the route and start the matching acquisition.
    ///
    /// In remote mode this resolves once the download has settled; local mode
    /// returns immediately and waits for a [`Selector`] to pick a file.
    pub async fn initialize(&self, route: &Route) {
        let mode = route.mode();
        self.shared.state.send_modify(|s| s.mode = mode);

        match mode {
            Mode::Local => debug!("Local file mode"),
            Mode::Remote => match route.param("url").filter(|u| !u.is_empty()) {
                Some(url) => self.load_remote(url).await,
                None => {
                    let err = AcquireError::MissingUrl;
                    warn!("{err}");
                    self.fail(err.user_message());
                }
            },
        }
    }

    /// Download `url` and select it. Failures are not retried.
    ///
    /// Dropping the future before it resolves clears `downloading` unless a
    /// newer acquisition has already taken over.
    pub async fn load_remote(&self, url: &str) {
        let pending = PendingLoad::begin(Arc::clone(&self.shared), Busy::Downloading);

        let result = self.fetcher.download(url).await;

        if !pending.is_current() {
            debug!("Discarding stale download of {url}");
            return;
        }

        match result {
            Ok(handle) => {
                info!("Remote recording ready: {handle}");
                pending.complete(Arc::new(handle));
            }
            Err(e) => {
                error!("Remote file download error: {e}");
                self.fail(e.user_message());
            }
        }
    }

    fn fail(&self, message: String) {
        self.shared.state.send_modify(|s| {
            s.error = true;
            s.error_message = Some(message);
            s.downloading = false;
            s.loading = false;
            s.selected = None;
        });
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(shared: Arc<Shared>, mut rx: broadcast::Receiver<PlayerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!("Player event: {event:?}");
                shared.apply_event(&event);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Missed {n} player event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
