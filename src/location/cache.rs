//! In-memory location cache for one run.
//!
//! Keys are exact location strings. Each key owns a slot with two cells:
//! the raw outcome of looking that string up, and the final coordinate the
//! resolver settled on for it (possibly via a truncated suffix). Both cells
//! are write-once, so the first writer wins and entries are never replaced.
//! Nothing is evicted or persisted.

use super::types::Coordinate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Default)]
struct Slot {
    lookup: OnceLock<Option<Coordinate>>,
    resolved: OnceLock<Coordinate>,
}

/// Counters for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub lookups: usize,
}

/// The location cache.
#[derive(Default)]
pub struct LocationCache {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    hits: AtomicUsize,
    lookups: AtomicUsize,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(Slot::default());
        slots.insert(key.to_string(), Arc::clone(&slot));
        slot
    }

    fn existing(&self, key: &str) -> Option<Arc<Slot>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).cloned()
    }

    /// Final coordinate recorded for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Coordinate> {
        let hit = self.existing(key)?.resolved.get().copied();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Record the final coordinate for `key` unless one is already there.
    /// Returns the value that ends up stored.
    pub fn put(&self, key: &str, coord: Coordinate) -> Coordinate {
        let slot = self.slot(key);
        let _ = slot.resolved.set(coord);
        slot.resolved.get().copied().unwrap_or(coord)
    }

    /// Raw lookup outcome for exactly `key`, running `lookup` at most once per
    /// key for the lifetime of the cache. Concurrent callers for the same key
    /// block until the single in-flight lookup finishes and share its result.
    pub fn lookup_once<F>(&self, key: &str, lookup: F) -> Option<Coordinate>
    where
        F: FnOnce() -> Option<Coordinate>,
    {
        let slot = self.slot(key);
        *slot.lookup.get_or_init(|| {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            lookup()
        })
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
        }
    }
}
