//! The derived-graph cache.
//!
//! Every lookup for a key runs under that key's single-flight guard:
//!
//! 1. no entry: transform the source and install a new entry;
//! 2. the source's fingerprint moved: transform again and install a new entry
//!    with a new handle (the old handle is never touched again);
//! 3. otherwise compare the derived graph with the fingerprint recorded when
//!    the cache last wrote it. Unchanged means a plain hit. Drift means the
//!    canonical result is recomputed and, if it differs, written back into
//!    the existing handle so every holder sees the repair.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use pagcache_graph::{Fingerprint, Graph, GraphId};
use pagcache_transform::{DagToPag, Transform, TransformError};
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelFlag;
use crate::config::{CacheConfig, KeyMode};
use crate::entry::{CacheEntry, SharedGraph, read_graph, write_graph};
use crate::error::{CacheError, ConfigError};
use crate::flight::{Flight, Leader, Slot};
use crate::stats::{CacheStats, Counters, bump};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Instance(GraphId),
    Structure(Fingerprint),
}

/// Memoizes a [`Transform`] over source graphs.
pub struct DerivedCache<T> {
    transform: T,
    config: CacheConfig,
    slots: DashMap<CacheKey, Arc<Slot>>,
    /// Live slots holding an entry. Changes only under a slot's state lock.
    entries: AtomicUsize,
    clock: AtomicU64,
    counters: Counters,
}

/// The DAG → PAG cache.
pub type PagCache = DerivedCache<DagToPag>;

impl<T: Transform> DerivedCache<T> {
    pub fn new(transform: T) -> Self {
        DerivedCache {
            transform,
            config: CacheConfig::default(),
            slots: DashMap::new(),
            entries: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn with_config(transform: T, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let slots = match config.shard_amount {
            Some(shards) => DashMap::with_shard_amount(shards),
            None => DashMap::new(),
        };
        Ok(DerivedCache {
            transform,
            config,
            slots,
            entries: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        })
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The derived graph for `source`, computing, repairing or rebuilding it
    /// as needed. Repeated calls for an unchanged source return the same
    /// handle.
    pub fn get_derived(&self, source: &Graph) -> Result<SharedGraph, CacheError> {
        self.lookup(source, None)
    }

    /// Like [`get_derived`](Self::get_derived), but returns
    /// [`CacheError::Cancelled`] without touching the cache when `cancel` is
    /// raised.
    pub fn get_derived_cancellable(
        &self,
        source: &Graph,
        cancel: &CancelFlag,
    ) -> Result<SharedGraph, CacheError> {
        self.lookup(source, Some(cancel))
    }

    /// Drop the entry for `source`. Returns whether one existed.
    pub fn invalidate(&self, source: &Graph) -> bool {
        let key = self.key_for(source, || Fingerprint::of(source));
        let mut existed = false;
        self.slots.remove_if(&key, |_, slot| {
            existed = slot.state.lock().retire(&self.entries);
            true
        });
        if existed {
            debug!(source = %source.id(), "cache entry invalidated");
        }
        existed
    }

    pub fn clear(&self) {
        let mut entries = 0;
        self.slots.retain(|_, slot| {
            if slot.state.lock().retire(&self.entries) {
                entries += 1;
            }
            false
        });
        info!(entries, "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, source: &Graph) -> bool {
        let key = self.key_for(source, || Fingerprint::of(source));
        self.slots
            .get(&key)
            .is_some_and(|slot| slot.state.lock().entry.is_some())
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    /// Key for `source`. The fingerprint is only computed under structure
    /// keying.
    fn key_for(&self, source: &Graph, fingerprint: impl FnOnce() -> Fingerprint) -> CacheKey {
        match self.config.key_mode {
            KeyMode::Instance => CacheKey::Instance(source.id()),
            KeyMode::Structure => CacheKey::Structure(fingerprint()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn lookup(&self, source: &Graph, cancel: Option<&CancelFlag>) -> Result<SharedGraph, CacheError> {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            bump(&self.counters.cancelled);
            debug!(source = %source.id(), "lookup cancelled");
            return Err(CacheError::Cancelled);
        }

        let source_fp = Fingerprint::of(source);
        let key = self.key_for(source, || source_fp.clone());

        // A slot can leave the table between the map lookup and the state
        // lock; retired slots are skipped and the key is looked up again.
        let (slot, flight, entry) = loop {
            let slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());
            let mut state = slot.state.lock();
            if state.retired {
                continue;
            }
            let in_flight = state.flight.clone();
            if let Some(flight) = in_flight {
                drop(state);
                bump(&self.counters.joined);
                trace!(source = %source.id(), "joining in-flight derivation");
                return flight.wait();
            }
            let flight = Arc::new(Flight::default());
            state.flight = Some(Arc::clone(&flight));
            let entry = state.entry.clone();
            drop(state);
            break (slot, flight, entry);
        };

        let mut leader = Leader::new(&slot, flight, &self.entries);
        match self.resolve(source, source_fp, entry) {
            Ok(mut entry) => {
                entry.last_used = self.tick();
                let handle = Arc::clone(&entry.derived);
                leader.finish(Some(entry), Ok(Arc::clone(&handle)));
                drop(leader);
                self.enforce_capacity(&key);
                Ok(handle)
            }
            Err(err) => {
                bump(&self.counters.failures);
                warn!(source = %source.id(), error = %err, "derivation failed");
                leader.finish(None, Err(err.clone()));
                drop(leader);
                self.discard_if_empty(&key, &slot);
                Err(err)
            }
        }
    }

    /// Run the protocol on a snapshot of the slot's entry and return the
    /// entry to store. Only the flight leader calls this.
    fn resolve(
        &self,
        source: &Graph,
        source_fp: Fingerprint,
        entry: Option<CacheEntry>,
    ) -> Result<CacheEntry, CacheError> {
        let Some(mut entry) = entry else {
            let derived = self.run_transform(source)?;
            bump(&self.counters.misses);
            debug!(source = %source.id(), transform = self.transform.name(), "cache miss");
            return Ok(CacheEntry::new(source, source_fp, derived));
        };

        if entry.source_fingerprint != source_fp {
            let derived = self.run_transform(source)?;
            bump(&self.counters.rebuilds);
            info!(source = %source.id(), "source changed structurally, derived graph rebuilt");
            return Ok(CacheEntry::new(source, source_fp, derived));
        }

        let current = Fingerprint::of(&read_graph(&entry.derived));
        if current == entry.derived_fingerprint {
            bump(&self.counters.hits);
            trace!(source = %source.id(), "cache hit");
            return Ok(entry);
        }

        let canonical = self.run_transform(source)?;
        let canonical_fp = Fingerprint::of(&canonical);
        if current == canonical_fp {
            bump(&self.counters.hits);
            debug!(source = %source.id(), "derived graph rewritten to an equal structure");
        } else {
            write_graph(&entry.derived)
                .replace_with(&canonical)
                .map_err(|e| CacheError::Transform(TransformError::failed(e.to_string())))?;
            bump(&self.counters.repairs);
            debug!(source = %source.id(), "derived graph repaired in place");
        }
        entry.derived_fingerprint = canonical_fp;
        Ok(entry)
    }

    fn run_transform(&self, source: &Graph) -> Result<Graph, CacheError> {
        bump(&self.counters.transforms);
        Ok(self.transform.transform(source)?)
    }

    /// Evict least recently used idle entries until the table fits, never
    /// touching `keep` or an entry with a computation in flight.
    fn enforce_capacity(&self, keep: &CacheKey) {
        let Some(capacity) = self.config.capacity else {
            return;
        };
        while self.len() > capacity {
            let victim = self
                .slots
                .iter()
                .filter(|slot| slot.key() != keep)
                .filter_map(|slot| {
                    let state = slot.value().state.try_lock()?;
                    if state.flight.is_some() {
                        return None;
                    }
                    let last_used = state.entry.as_ref()?.last_used;
                    Some((slot.key().clone(), Arc::clone(slot.value()), last_used))
                })
                .min_by_key(|(_, _, last_used)| *last_used);

            let Some((key, slot, _)) = victim else {
                return;
            };
            let removed = self.slots.remove_if(&key, |_, current| {
                if !Arc::ptr_eq(current, &slot) {
                    return false;
                }
                let mut state = current.state.lock();
                if state.flight.is_some() {
                    return false;
                }
                state.retire(&self.entries);
                true
            });
            if removed.is_none() {
                return;
            }
            bump(&self.counters.evictions);
            info!(capacity, "evicted least recently used entry");
        }
    }

    /// Forget a slot left with neither an entry nor a flight after a failure.
    fn discard_if_empty(&self, key: &CacheKey, slot: &Arc<Slot>) {
        self.slots.remove_if(key, |_, current| {
            if !Arc::ptr_eq(current, slot) {
                return false;
            }
            let mut state = current.state.lock();
            if state.entry.is_some() || state.flight.is_some() {
                return false;
            }
            state.retire(&self.entries);
            true
        });
    }
}

impl<T: Transform + Default> Default for DerivedCache<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Transform> fmt::Debug for DerivedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCache")
            .field("transform", &self.transform.name())
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}
