//! Cache entries and the shared derived-graph handle.

use std::sync::Arc;

use pagcache_graph::{Fingerprint, Graph, GraphId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Handle to a derived graph. The cache hands out clones of one `Arc` per
/// entry; handle identity is `Arc::ptr_eq`.
///
/// Holders may mutate the graph through the lock. The cache detects such
/// drift on the next lookup and overwrites the contents in place.
pub type SharedGraph = Arc<RwLock<Graph>>;

pub fn read_graph(handle: &SharedGraph) -> RwLockReadGuard<'_, Graph> {
    handle.read()
}

pub fn write_graph(handle: &SharedGraph) -> RwLockWriteGuard<'_, Graph> {
    handle.write()
}

/// Whether two handles are the same derived object.
pub fn same_handle(a: &SharedGraph, b: &SharedGraph) -> bool {
    Arc::ptr_eq(a, b)
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Identity of the source the entry was built from.
    pub source_id: GraphId,
    /// Source structure at build time.
    pub source_fingerprint: Fingerprint,
    pub derived: SharedGraph,
    /// Structure of `derived` when the cache last wrote or verified it.
    pub derived_fingerprint: Fingerprint,
    /// Logical clock stamp of the last lookup, for LRU eviction.
    pub(crate) last_used: u64,
}

impl CacheEntry {
    pub(crate) fn new(source: &Graph, source_fingerprint: Fingerprint, derived: Graph) -> Self {
        let derived_fingerprint = Fingerprint::of(&derived);
        CacheEntry {
            source_id: source.id(),
            source_fingerprint,
            derived: Arc::new(RwLock::new(derived)),
            derived_fingerprint,
            last_used: 0,
        }
    }
}
