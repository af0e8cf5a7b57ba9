//! Per-key locks for serializing submissions.
//!
//! Two transactions proposed with the same key must not read the same
//! sequence number. Holding the key's lock from the account query until the
//! first transaction reaches a terminal status keeps them apart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::types::Address;

/// Async mutexes keyed by (address, key index).
///
/// Locks are created on first use. Each call to [`KeyLocks::lock`] drops the
/// entries nobody holds or waits for, so the map stays as small as the set of
/// keys in use.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<(Address, u32), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on one key. Released when the guard is dropped.
    pub async fn lock(&self, address: Address, key_index: u32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Guards and waiters hold a clone; the map alone means idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry((address, key_index)).or_default().clone()
        };
        tracing::trace!(%address, key_index, "Waiting for proposal key lock");
        lock.lock_owned().await
    }

    /// Number of keys held, waited for, or released since the last lock call.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks").field("keys", &self.len()).finish()
    }
}
