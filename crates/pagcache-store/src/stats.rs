//! Lookup counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time snapshot of a cache's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Entry found and its derived graph untouched (or harmlessly rewritten).
    pub hits: u64,
    /// No entry for the key.
    pub misses: u64,
    /// Derived graph overwritten in place after drift.
    pub repairs: u64,
    /// Entry replaced because the source changed structurally.
    pub rebuilds: u64,
    /// Calls into the wrapped transform.
    pub transforms: u64,
    /// Callers served by another thread's in-flight computation.
    pub joined: u64,
    pub evictions: u64,
    pub failures: u64,
    pub cancelled: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) repairs: AtomicU64,
    pub(crate) rebuilds: AtomicU64,
    pub(crate) transforms: AtomicU64,
    pub(crate) joined: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) cancelled: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub(crate) fn snapshot(&self, entries: usize) -> CacheStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            hits: get(&self.hits),
            misses: get(&self.misses),
            repairs: get(&self.repairs),
            rebuilds: get(&self.rebuilds),
            transforms: get(&self.transforms),
            joined: get(&self.joined),
            evictions: get(&self.evictions),
            failures: get(&self.failures),
            cancelled: get(&self.cancelled),
            entries,
        }
    }
}
