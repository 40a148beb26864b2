//! Guard against concurrent duplicate mutations.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use super::{SyncError, SyncResult};

type Slot = (&'static str, String);

/// Tracks `(action, key)` pairs with an outstanding call.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<Slot>>>,
}

/// Releases its slot when dropped.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    slot: Option<Slot>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `action` on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InFlight`] when the slot is already claimed.
    pub fn acquire(&self, action: &'static str, key: impl Display) -> SyncResult<InFlightGuard> {
        let slot = (action, key.to_string());
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(slot.clone()) {
            return Err(SyncError::InFlight {
                action,
                key: slot.1,
            });
        }
        Ok(InFlightGuard {
            registry: self.clone(),
            slot: Some(slot),
        })
    }

    /// Returns whether the slot is claimed.
    #[must_use]
    pub fn is_active(&self, action: &'static str, key: impl Display) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(action, key.to_string()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.registry
                .active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&slot);
        }
    }
}
