//! Server file list – lists recordings on the replay server, keeps the list
//! fresh with a background refresh timer, and loads the file the user picks.
//!
//! The refresh timer is a spawned task owned by the [`ServerFileList`].  It is
//! aborted by [`ServerFileList::stop_auto_refresh`] and when the list is
//! dropped, so no timer outlives its view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use replay_common::config::Config;
use replay_common::protocol::RecordingDescriptor;
use replay_common::recording::RecordingHandle;

use crate::acquisition::Selector;
use crate::error::AcquireError;
use crate::service::{normalize_path, RecordingCatalog};

const NOTICE_CAPACITY: usize = 16;

/// Observable state of one file list view.
#[derive(Debug, Clone, Default)]
pub struct FileListState {
    pub recordings: Vec<RecordingDescriptor>,
    pub recordings_count: usize,
    /// Directory used by refreshes (`None` = server default).
    pub directory: Option<String>,
    pub loading: bool,
    pub error: bool,
    pub error_message: Option<String>,
    pub last_update: Option<DateTime<Local>>,
    /// Last file loaded through [`ServerFileList::select_file`].
    pub file: Option<Arc<RecordingHandle>>,
}

/// Informational notices; nothing depends on receiving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileListNotice {
    NewRecordings { added: usize, total: usize },
}

#[derive(Debug, Clone)]
pub struct FileListOptions {
    pub auto_refresh: bool,
    /// Must be non-zero.
    pub refresh_interval: Duration,
    pub directory: Option<String>,
}

impl Default for FileListOptions {
    fn default() -> Self {
        FileListOptions {
            auto_refresh: true,
            refresh_interval: Duration::from_secs(30),
            directory: None,
        }
    }
}

impl From<&Config> for FileListOptions {
    fn from(config: &Config) -> Self {
        FileListOptions {
            auto_refresh: config.auto_refresh,
            refresh_interval: config.refresh_interval(),
            directory: None,
        }
    }
}

struct Shared {
    catalog: Arc<dyn RecordingCatalog>,
    state: watch::Sender<FileListState>,
    notices: broadcast::Sender<FileListNotice>,
    /// Bumped by every listing, silent or not.
    list_generation: AtomicU64,
    /// Bumped by visible listings only.
    visible_generation: AtomicU64,
    load_generation: AtomicU64,
    selector: Option<Selector>,
}

impl Shared {
    /// A silent result is dropped once any newer listing has started; a
    /// visible one only yields to a newer visible listing, so background
    /// ticks can never swallow a manual refresh.
    async fn load_recordings(&self, directory: Option<&str>, silent: bool) {
        let generation = self.list_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let visible =
            (!silent).then(|| LoadingGuard::begin(&self.state, &self.visible_generation));
        self.state.send_modify(|s| {
            if !silent {
                s.loading = true;
            }
            s.error = false;
            s.error_message = None;
        });

        let result = self.catalog.list_recordings(directory).await;

        let current = match &visible {
            Some(guard) => guard.is_current(),
            None => self.list_generation.load(Ordering::SeqCst) == generation,
        };
        if !current {
            debug!("Discarding stale recordings listing");
            return;
        }

        match result {
            Ok(recordings) => {
                let previous = self.state.borrow().recordings_count;
                let count = recordings.len();
                self.state.send_modify(|s| {
                    s.recordings = recordings;
                    s.recordings_count = count;
                    if !silent {
                        s.loading = false;
                    }
                    s.last_update = Some(Local::now());
                });

                if silent && previous > 0 && count > previous {
                    let added = count - previous;
                    info!("New recordings detected: {added}");
                    // No receivers is fine.
                    let _ = self.notices.send(FileListNotice::NewRecordings {
                        added,
                        total: count,
                    });
                }
            }
            Err(e) => {
                warn!("Cannot list server recordings: {e}");
                self.state.send_modify(|s| {
                    s.error = true;
                    s.error_message = Some(e.user_message());
                    if !silent {
                        s.loading = false;
                    }
                    s.recordings.clear();
                });
            }
        }
    }
}

/// Clears `loading` when dropped, unless a newer operation counted on the
/// same generation has started since.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<FileListState>,
    counter: &'a AtomicU64,
    generation: u64,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<FileListState>, counter: &'a AtomicU64) -> Self {
        LoadingGuard {
            state,
            counter,
            generation: counter.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.is_current() {
            self.state.send_if_modified(|s| std::mem::take(&mut s.loading));
        }
    }
}

/// One file list view.
pub struct ServerFileList {
    shared: Arc<Shared>,
    auto_refresh: bool,
    refresh_interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl ServerFileList {
    pub fn new(catalog: Arc<dyn RecordingCatalog>, options: FileListOptions) -> Self {
        let (state, _) = watch::channel(FileListState {
            directory: options.directory,
            ..Default::default()
        });
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        ServerFileList {
            shared: Arc::new(Shared {
                catalog,
                state,
                notices,
                list_generation: AtomicU64::new(0),
                visible_generation: AtomicU64::new(0),
                load_generation: AtomicU64::new(0),
                selector: None,
            }),
            auto_refresh: options.auto_refresh,
            refresh_interval: options.refresh_interval,
            timer: None,
        }
    }

    /// Also publish selected files through `selector`.
    ///
    /// Call before [`open`](Self::open); the binding is fixed once a timer
    /// task holds the shared state.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.selector = Some(selector);
        } else {
            warn!("File list already running – selector ignored");
        }
        self
    }

    /// Initial (visible) load, then start auto-refresh.
    pub async fn open(&mut self) {
        let directory = self.directory();
        self.shared
            .load_recordings(directory.as_deref(), false)
            .await;
        self.start_auto_refresh();
    }

    pub fn watch(&self) -> watch::Receiver<FileListState> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> FileListState {
        self.shared.state.borrow().clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<FileListNotice> {
        self.shared.notices.subscribe()
    }

    pub fn directory(&self) -> Option<String> {
        self.shared.state.borrow().directory.clone()
    }

    /// Change the directory used by subsequent refreshes.
    pub fn set_directory(&self, directory: Option<String>) {
        self.shared.state.send_modify(|s| s.directory = directory);
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh
    }

    /// Whether a refresh timer is currently scheduled.
    pub fn is_refreshing(&self) -> bool {
        self.timer.is_some()
    }

    /// List `directory` and replace the current list.
    ///
    /// A silent load leaves the loading indicator alone.
    pub async fn load_recordings(&self, directory: Option<&str>, silent: bool) {
        self.shared.load_recordings(directory, silent).await;
    }

    /// (Re)start the refresh timer if auto-refresh is enabled.
    ///
    /// Any existing timer is cancelled first, so repeated calls never stack.
    pub fn start_auto_refresh(&mut self) {
        self.cancel_timer();
        if !self.auto_refresh {
            return;
        }
        if self.refresh_interval.is_zero() {
            warn!("Refresh interval is zero – auto-refresh not started");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.refresh_interval;
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let directory = shared.state.borrow().directory.clone();
                shared.load_recordings(directory.as_deref(), true).await;
            }
        }));
        debug!("Auto-refresh every {}ms", period.as_millis());
    }

    pub fn stop_auto_refresh(&mut self) {
        if self.cancel_timer() {
            debug!("Auto-refresh stopped");
        }
    }

    pub fn toggle_auto_refresh(&mut self) {
        self.auto_refresh = !self.auto_refresh;
        if self.auto_refresh {
            self.start_auto_refresh();
        } else {
            self.stop_auto_refresh();
        }
    }

    /// Manual refresh of the current directory, with loading indicator.
    pub async fn refresh_now(&self) {
        let directory = self.directory();
        self.shared
            .load_recordings(directory.as_deref(), false)
            .await;
    }

    /// Load the file behind `recording` and make it the current file.
    ///
    /// The error is also recorded in the view state.  Dropping the future
    /// early clears the loading indicators it raised.
    pub async fn select_file(
        &self,
        recording: &RecordingDescriptor,
    ) -> Result<Arc<RecordingHandle>, AcquireError> {
        let guard = LoadingGuard::begin(&self.shared.state, &self.shared.load_generation);
        let acquisition = self.shared.selector.as_ref().map(Selector::begin_load);
        self.shared.state.send_modify(|s| {
            s.loading = true;
            s.error = false;
            s.error_message = None;
        });

        let path = normalize_path(&recording.path);
        let result = self.shared.catalog.load_file(&path).await;
        let current = guard.is_current();

        match result {
            Ok(handle) => {
                let handle = Arc::new(handle);
                if current {
                    self.shared.state.send_modify(|s| {
                        s.file = Some(Arc::clone(&handle));
                        s.loading = false;
                    });
                } else {
                    debug!("Discarding stale load of {path}");
                }
                if let Some(pending) = acquisition {
                    pending.complete(Arc::clone(&handle));
                }
                Ok(handle)
            }
            Err(e) => {
                warn!("Cannot load {path}: {e}");
                if current {
                    self.shared.state.send_modify(|s| {
                        s.error = true;
                        s.error_message = Some(e.user_message());
                        s.loading = false;
                    });
                }
                Err(e)
            }
        }
    }

    /// Abort the timer task, if any. Returns whether one was running.
    fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for ServerFileList {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::Acquisition;
    use crate::events::EventBus;
    use crate::remote::RemoteFetch;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// In-memory catalog: serves a list whose size the test controls.
    struct FakeCatalog {
        listing: Mutex<Result<Vec<RecordingDescriptor>, AcquireError>>,
        list_calls: AtomicUsize,
        dirs: Mutex<Vec<Option<String>>>,
    }

    impl FakeCatalog {
        fn with_count(n: usize) -> Arc<Self> {
            let c = FakeCatalog {
                listing: Mutex::new(Ok(Vec::new())),
                list_calls: AtomicUsize::new(0),
                dirs: Mutex::new(Vec::new()),
            };
            c.set_count(n);
            Arc::new(c)
        }

        fn set_count(&self, n: usize) {
            *self.listing.lock().unwrap() = Ok((0..n).map(descriptor).collect());
        }

        fn set_error(&self, e: AcquireError) {
            *self.listing.lock().unwrap() = Err(e);
        }

        fn calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    fn descriptor(i: usize) -> RecordingDescriptor {
        RecordingDescriptor {
            path: format!("dir/rec{i}.guac"),
            name: None,
            size: 100,
            modified: 1.0,
        }
    }

    #[async_trait]
    impl RecordingCatalog for FakeCatalog {
        async fn list_recordings(
            &self,
            directory: Option<&str>,
        ) -> Result<Vec<RecordingDescriptor>, AcquireError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.dirs.lock().unwrap().push(directory.map(str::to_string));
            self.listing.lock().unwrap().clone()
        }

        async fn load_file(&self, path: &str) -> Result<RecordingHandle, AcquireError> {
            match path {
                "/dir/missing.guac" => Err(AcquireError::FileNotFound(path.to_string())),
                _ => Ok(RecordingHandle::new(
                    path.rsplit('/').next().unwrap_or_default(),
                    b"data".to_vec(),
                )),
            }
        }
    }

    /// Catalog whose calls block until the test hands out permits, one per
    /// call in arrival order.
    struct GatedCatalog {
        listing: Vec<RecordingDescriptor>,
        gate: Semaphore,
        list_calls: AtomicUsize,
    }

    impl GatedCatalog {
        fn with_count(n: usize) -> Arc<Self> {
            Arc::new(GatedCatalog {
                listing: (0..n).map(descriptor).collect(),
                gate: Semaphore::new(0),
                list_calls: AtomicUsize::new(0),
            })
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        fn calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        async fn pass(&self) -> Result<(), AcquireError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| AcquireError::ListFailed)?;
            permit.forget();
            Ok(())
        }
    }

    #[async_trait]
    impl RecordingCatalog for GatedCatalog {
        async fn list_recordings(
            &self,
            _directory: Option<&str>,
        ) -> Result<Vec<RecordingDescriptor>, AcquireError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.pass().await?;
            Ok(self.listing.clone())
        }

        async fn load_file(&self, path: &str) -> Result<RecordingHandle, AcquireError> {
            self.pass().await?;
            Ok(RecordingHandle::new(path, b"data".to_vec()))
        }
    }

    fn options(ms: u64) -> FileListOptions {
        FileListOptions {
            auto_refresh: true,
            refresh_interval: Duration::from_millis(ms),
            directory: None,
        }
    }

    #[tokio::test]
    async fn test_load_recordings() {
        let catalog = FakeCatalog::with_count(3);
        let list = ServerFileList::new(catalog.clone(), options(100));

        list.load_recordings(Some("team"), false).await;

        let s = list.snapshot();
        assert_eq!(s.recordings.len(), 3);
        assert_eq!(s.recordings_count, 3);
        assert!(!s.loading);
        assert!(!s.error);
        assert!(s.last_update.is_some());
        assert_eq!(catalog.dirs.lock().unwrap()[0].as_deref(), Some("team"));
    }

    #[tokio::test]
    async fn test_load_failure_clears_list() {
        let catalog = FakeCatalog::with_count(2);
        let list = ServerFileList::new(catalog.clone(), options(100));
        list.load_recordings(None, false).await;

        catalog.set_error(AcquireError::DirectoryNotFound);
        list.load_recordings(None, true).await;

        let s = list.snapshot();
        assert!(s.error);
        assert_eq!(
            s.error_message.as_deref(),
            Some("Recordings directory not found")
        );
        assert!(s.recordings.is_empty());
        assert!(!s.loading);

        // The next successful load clears the error.
        catalog.set_count(1);
        list.refresh_now().await;
        let s = list.snapshot();
        assert!(!s.error);
        assert!(s.error_message.is_none());
        assert_eq!(s.recordings.len(), 1);
    }

    #[tokio::test]
    async fn test_new_recordings_notice() {
        let catalog = FakeCatalog::with_count(0);
        let list = ServerFileList::new(catalog.clone(), options(100));
        let mut notices = list.notices();

        // First load from zero never notifies.
        catalog.set_count(2);
        list.load_recordings(None, true).await;
        assert!(notices.try_recv().is_err());

        catalog.set_count(5);
        list.load_recordings(None, true).await;
        assert_eq!(
            notices.try_recv().unwrap(),
            FileListNotice::NewRecordings { added: 3, total: 5 }
        );

        // Non-silent loads do not notify.
        catalog.set_count(7);
        list.load_recordings(None, false).await;
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_ticks_silently() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        list.set_directory(Some("team".into()));

        list.start_auto_refresh();
        assert!(list.is_refreshing());

        // Nothing before the first full interval.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(catalog.calls(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(catalog.calls(), 3);
        assert!(!list.snapshot().loading);
        assert!(catalog
            .dirs
            .lock()
            .unwrap()
            .iter()
            .all(|d| d.as_deref() == Some("team")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_tick_never_shows_loading() {
        let catalog = GatedCatalog::with_count(2);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        let mut rx = list.watch();
        list.start_auto_refresh();

        // First tick is now blocked inside the catalog.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(catalog.calls(), 1);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().loading);
        assert!(!list.snapshot().loading);

        catalog.release(1);
        rx.changed().await.unwrap();
        let s = rx.borrow_and_update().clone();
        assert_eq!(s.recordings.len(), 2);
        assert!(!s.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_tick_keeps_manual_refresh() {
        let catalog = GatedCatalog::with_count(3);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        list.start_auto_refresh();

        let shared = Arc::clone(&list.shared);
        let manual = tokio::spawn(async move { shared.load_recordings(None, false).await });

        // Manual refresh first, then a tick; both blocked.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(catalog.calls(), 2);
        assert!(list.snapshot().loading);

        list.toggle_auto_refresh();
        catalog.release(1);
        manual.await.unwrap();

        let s = list.snapshot();
        assert!(!s.loading);
        assert_eq!(s.recordings.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_applies_despite_newer_tick() {
        let catalog = GatedCatalog::with_count(1);
        let list = Arc::new(ServerFileList::new(catalog.clone(), options(100)));

        let l = Arc::clone(&list);
        let manual = tokio::spawn(async move { l.refresh_now().await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        let l = Arc::clone(&list);
        let silent = tokio::spawn(async move { l.load_recordings(None, true).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(catalog.calls(), 2);

        // Let the manual call through first; the newer silent result lands last.
        catalog.release(1);
        manual.await.unwrap();
        assert!(!list.snapshot().loading);
        catalog.release(1);
        silent.await.unwrap();

        let s = list.snapshot();
        assert!(!s.loading);
        assert_eq!(s.recordings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_one_timer() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(catalog.clone(), options(100));

        list.start_auto_refresh();
        list.start_auto_refresh();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(catalog.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_twice() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        list.start_auto_refresh();

        list.toggle_auto_refresh();
        assert!(!list.auto_refresh_enabled());
        assert!(!list.is_refreshing());

        list.toggle_auto_refresh();
        assert!(list.auto_refresh_enabled());
        assert!(list.is_refreshing());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(catalog.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_starts() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(
            catalog.clone(),
            FileListOptions {
                auto_refresh: false,
                ..options(100)
            },
        );
        list.start_auto_refresh();
        assert!(!list.is_refreshing());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        list.start_auto_refresh();
        list.stop_auto_refresh();
        list.stop_auto_refresh();
        assert!(!list.is_refreshing());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_timer() {
        let catalog = FakeCatalog::with_count(1);
        let mut list = ServerFileList::new(catalog.clone(), options(100));
        list.open().await;
        assert_eq!(catalog.calls(), 1);

        drop(list);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(catalog.calls(), 1);
        // The aborted task no longer holds the catalog.
        assert_eq!(Arc::strong_count(&catalog), 1);
    }

    #[tokio::test]
    async fn test_select_file() {
        let catalog = FakeCatalog::with_count(1);
        let list = ServerFileList::new(catalog, options(100));

        let h = list.select_file(&descriptor(0)).await.unwrap();
        assert_eq!(h.name, "rec0.guac");
        let s = list.snapshot();
        assert_eq!(s.file.unwrap().name, "rec0.guac");
        assert!(!s.loading);

        let missing = RecordingDescriptor {
            path: "/dir/missing.guac".into(),
            ..descriptor(0)
        };
        assert!(list.select_file(&missing).await.is_err());
        let s = list.snapshot();
        assert!(s.error);
        assert_eq!(
            s.error_message.as_deref(),
            Some("File not found: /dir/missing.guac")
        );
        assert!(!s.loading);
    }

    struct NoRemote;

    #[async_trait]
    impl RemoteFetch for NoRemote {
        async fn download(&self, _url: &str) -> Result<RecordingHandle, AcquireError> {
            Err(AcquireError::Download(String::new()))
        }
    }

    #[tokio::test]
    async fn test_select_file_publishes_to_acquisition() {
        let acq = Acquisition::new(Arc::new(NoRemote), &EventBus::new());
        let list = ServerFileList::new(FakeCatalog::with_count(1), options(100))
            .with_selector(acq.selector());

        list.select_file(&descriptor(0)).await.unwrap();
        let s = acq.snapshot();
        assert_eq!(s.selected.unwrap().name, "rec0.guac");
        assert!(!s.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_select_clears_loading() {
        let acq = Acquisition::new(Arc::new(NoRemote), &EventBus::new());
        let catalog = GatedCatalog::with_count(1);
        let list = ServerFileList::new(catalog, options(100)).with_selector(acq.selector());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), list.select_file(&descriptor(0)))
                .await;
        assert!(cancelled.is_err());

        let s = list.snapshot();
        assert!(!s.loading);
        assert!(s.file.is_none());
        let s = acq.snapshot();
        assert!(!s.loading);
        assert!(s.selected.is_none());
    }
}
