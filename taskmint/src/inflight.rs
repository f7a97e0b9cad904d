//! Per-key in-flight markers.
//!
//! Enforces "at most one outstanding operation per key" (one claim per
//! identity, one mutation per task). Acquiring returns a guard; the
//! marker is cleared when the guard drops, on every exit path.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

/// Set of keys with an operation currently in flight.
#[derive(Debug)]
pub struct InFlight<K: Eq + Hash + Clone> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Marks `key` as in flight.
    ///
    /// Returns `None` if an operation for `key` is already outstanding.
    #[must_use]
    pub fn try_acquire(&self, key: &K) -> Option<InFlightGuard<K>> {
        if !self.keys.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.clone(),
        })
    }

    /// Whether `key` is currently in flight.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.keys.lock().contains(key)
    }

    /// Snapshot of all keys currently in flight.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.keys.lock().iter().cloned().collect()
    }
}

impl<K: Eq + Hash + Clone> Default for InFlight<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears its key from the owning [`InFlight`] set on drop.
#[derive(Debug)]
pub struct InFlightGuard<K: Eq + Hash + Clone> {
    keys: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash + Clone> InFlightGuard<K> {
    /// The key this guard holds.
    pub const fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}
