//! Port for publishing engine events.

use crate::sync::domain::SyncEvent;

/// Receives events describing mapping changes and merges.
///
/// Publication is fire-and-forget: a publisher must not fail the operation
/// that produced the event.
pub trait SyncEventPublisher: Send + Sync {
    /// Publishes an event.
    fn publish(&self, event: SyncEvent);
}
