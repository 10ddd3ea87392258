//! Single-flight guard: one computation per key, joiners wait for its outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pagcache_transform::TransformError;
use parking_lot::{Condvar, Mutex};

use crate::entry::{CacheEntry, SharedGraph};
use crate::error::CacheError;

pub(crate) type Outcome = Result<SharedGraph, CacheError>;

/// Per-key state. `flight` is set while some thread runs the lookup protocol.
/// `retired` is set, under the state lock, when the slot leaves the table; a
/// caller that finds a retired slot must look the key up again.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) state: Mutex<SlotState>,
}

#[derive(Default)]
pub(crate) struct SlotState {
    pub(crate) entry: Option<CacheEntry>,
    pub(crate) flight: Option<Arc<Flight>>,
    pub(crate) retired: bool,
}

impl SlotState {
    /// Mark the slot as gone from the table. Returns whether it held an entry,
    /// which is then no longer counted in `entries`.
    pub(crate) fn retire(&mut self, entries: &AtomicUsize) -> bool {
        self.retired = true;
        let had_entry = self.entry.is_some();
        if had_entry {
            entries.fetch_sub(1, Ordering::Relaxed);
        }
        had_entry
    }
}

/// An in-progress computation whose outcome is broadcast to every joiner.
#[derive(Default)]
pub(crate) struct Flight {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl Flight {
    /// Block until the leader publishes, then take a copy of its outcome.
    pub(crate) fn wait(&self) -> Outcome {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut outcome);
        }
    }

    fn publish(&self, result: Outcome) {
        *self.outcome.lock() = Some(result);
        self.ready.notify_all();
    }
}

/// Held by the thread that owns a slot's flight. Finishing stores the new
/// entry (if any), releases the slot and wakes joiners. Dropping an
/// unfinished leader (the transform panicked) publishes a failure so
/// joiners never wait forever.
///
/// A retired slot keeps no entry: the outcome still reaches this flight's
/// callers but is not cached.
pub(crate) struct Leader<'a> {
    slot: &'a Slot,
    flight: Arc<Flight>,
    entries: &'a AtomicUsize,
    finished: bool,
}

impl<'a> Leader<'a> {
    pub(crate) fn new(slot: &'a Slot, flight: Arc<Flight>, entries: &'a AtomicUsize) -> Self {
        Leader {
            slot,
            flight,
            entries,
            finished: false,
        }
    }

    pub(crate) fn finish(&mut self, entry: Option<CacheEntry>, outcome: Outcome) {
        {
            let mut state = self.slot.state.lock();
            match entry {
                Some(entry) if !state.retired => {
                    if state.entry.replace(entry).is_none() {
                        self.entries.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ => {}
            }
            state.flight = None;
        }
        self.flight.publish(outcome);
        self.finished = true;
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let err = CacheError::Transform(TransformError::failed("derivation panicked"));
            self.finish(None, Err(err));
        }
    }
}
