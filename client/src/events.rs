//! Lifecycle signals emitted by the playback engine.

use tokio::sync::broadcast;

/// Broadcast channel capacity.
const EVENT_CAPACITY: usize = 64;

/// A lifecycle signal from the playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A new recording started loading.
    LoadingStarted,
    /// Loading or playback failed; the message may be absent.
    Error(Option<String>),
    Playing,
    Paused,
}

/// Publish/subscribe channel scoped to one acquisition session.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        EventBus { tx }
    }

    /// Publish an event. Returns the number of subscribers that will see it.
    pub fn emit(&self, event: PlayerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
