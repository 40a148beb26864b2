//! Event publisher backed by a tokio broadcast channel.

use tokio::sync::broadcast;
use tracing::debug;

use crate::sync::{domain::SyncEvent, ports::SyncEventPublisher};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out publisher for [`SyncEvent`]s.
///
/// Events published without subscribers are dropped. Slow subscribers
/// observe [`broadcast::error::RecvError::Lagged`].
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl BroadcastEventBus {
    /// Creates a bus buffering `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl SyncEventPublisher for BroadcastEventBus {
    fn publish(&self, event: SyncEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "published sync event"),
            Err(_) => debug!(event = name, "dropped sync event without subscribers"),
        }
    }
}
