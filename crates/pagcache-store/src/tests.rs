//! Unit tests for pagcache-store

use crate::*;
use pagcache_graph::{Endpoint, Graph};
use pagcache_transform::{DagToPag, FnTransform, Transform, TransformError};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// `DagToPag` that counts its calls and optionally sleeps first.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
    delay: Duration,
}

impl Counting {
    fn slow(delay: Duration) -> Self {
        Counting {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        DagToPag.transform(source)
    }
}

fn graph(text: &str) -> Graph {
    text.parse().unwrap()
}

fn abc() -> Graph {
    graph("A --> B\nB --> C\n")
}

fn counting_cache() -> DerivedCache<Counting> {
    DerivedCache::new(Counting::default())
}

#[test]
fn test_same_handle_for_unchanged_source() {
    let cache = counting_cache();
    let source = abc();

    let first = cache.get_derived(&source).unwrap();
    let second = cache.get_derived(&source).unwrap();

    assert!(same_handle(&first, &second));
    assert_eq!(cache.transform().calls(), 1);
    let stats = cache.stats();
    assert_eq!((stats.misses, stats.hits, stats.entries), (1, 1, 1));
}

#[test]
fn test_repeated_lookups_transform_once() {
    let cache = counting_cache();
    let source = abc();
    let first = cache.get_derived(&source).unwrap();
    for _ in 0..10 {
        let again = cache.get_derived(&source).unwrap();
        assert!(same_handle(&first, &again));
    }
    assert_eq!(cache.transform().calls(), 1);
    assert_eq!(cache.stats().hits, 10);
}

#[test]
fn test_derived_matches_transform_output() {
    let cache = PagCache::default();
    let source = graph("A --> C\nB --> C\nC --> D\n");
    let handle = cache.get_derived(&source).unwrap();
    assert_eq!(*read_graph(&handle), DagToPag.transform(&source).unwrap());
}

#[test]
fn test_mutated_derived_graph_is_repaired_in_place() {
    let cache = counting_cache();
    let source = abc();
    let handle = cache.get_derived(&source).unwrap();
    let holder = Arc::clone(&handle);
    let derived_id = read_graph(&handle).id();

    write_graph(&holder)
        .set_endpoint("B", "A", Endpoint::Arrow)
        .unwrap();
    assert_ne!(*read_graph(&handle), DagToPag.transform(&source).unwrap());

    let again = cache.get_derived(&source).unwrap();
    assert!(same_handle(&handle, &again));
    assert_eq!(read_graph(&again).id(), derived_id);
    assert_eq!(*read_graph(&holder), DagToPag.transform(&source).unwrap());
    assert_eq!(read_graph(&holder).endpoint("B", "A"), Some(Endpoint::Circle));

    let stats = cache.stats();
    assert_eq!(stats.repairs, 1);
    assert_eq!(cache.transform().calls(), 2);
}

#[test]
fn test_repair_after_structural_damage() {
    let cache = PagCache::default();
    let source = abc();
    let handle = cache.get_derived(&source).unwrap();

    {
        let mut derived = write_graph(&handle);
        derived.remove_edge("A", "B").unwrap();
        derived.add_variable("Stray").unwrap();
    }

    let again = cache.get_derived(&source).unwrap();
    assert!(same_handle(&handle, &again));
    let derived = read_graph(&again);
    assert!(!derived.contains_node("Stray"));
    assert_eq!(derived.edge_count(), 2);
    assert_eq!(*derived, graph("A o-o B\nB o-o C\n"));
}

#[test]
fn test_reverted_mutation_needs_no_transform() {
    let cache = counting_cache();
    let source = abc();
    let handle = cache.get_derived(&source).unwrap();

    write_graph(&handle).set_endpoint("B", "A", Endpoint::Arrow).unwrap();
    write_graph(&handle).set_endpoint("B", "A", Endpoint::Circle).unwrap();

    let again = cache.get_derived(&source).unwrap();
    assert!(same_handle(&handle, &again));
    assert_eq!(cache.transform().calls(), 1);
    assert_eq!(cache.stats().repairs, 0);
}

#[test]
fn test_source_change_rebuilds_with_new_handle() {
    let cache = counting_cache();
    let mut source = abc();
    let old = cache.get_derived(&source).unwrap();
    let old_contents = read_graph(&old).clone();

    source.add_directed_edge("A", "C").unwrap();
    let new = cache.get_derived(&source).unwrap();

    assert!(!same_handle(&old, &new));
    assert_eq!(*read_graph(&new), DagToPag.transform(&source).unwrap());
    assert_eq!(read_graph(&new).edge_count(), 3);
    assert_eq!(*read_graph(&old), old_contents);

    let stats = cache.stats();
    assert_eq!((stats.misses, stats.rebuilds, stats.entries), (1, 1, 1));

    let third = cache.get_derived(&source).unwrap();
    assert!(same_handle(&new, &third));
}

#[test]
fn test_position_change_is_not_a_rebuild() {
    let cache = counting_cache();
    let mut source = abc();
    let handle = cache.get_derived(&source).unwrap();

    source.set_position("A", 10.0, -4.5).unwrap();
    let again = cache.get_derived(&source).unwrap();

    assert!(same_handle(&handle, &again));
    assert_eq!(cache.transform().calls(), 1);
    assert_eq!(cache.stats().rebuilds, 0);
}

#[test]
fn test_flip_then_extend_scenario() {
    let cache = PagCache::default();
    let mut source = abc();

    let h1 = cache.get_derived(&source).unwrap();
    assert_eq!(*read_graph(&h1), graph("A o-o B\nB o-o C\n"));

    write_graph(&h1).set_endpoint("A", "B", Endpoint::Arrow).unwrap();
    let h2 = cache.get_derived(&source).unwrap();
    assert!(same_handle(&h1, &h2));
    assert_eq!(read_graph(&h2).endpoint("A", "B"), Some(Endpoint::Circle));

    source.add_directed_edge("A", "C").unwrap();
    let h3 = cache.get_derived(&source).unwrap();
    assert!(!same_handle(&h1, &h3));
    assert!(read_graph(&h3).is_adjacent("A", "C"));
    assert!(!read_graph(&h1).is_adjacent("A", "C"));
}

#[test]
fn test_edgeless_source() {
    let cache = PagCache::default();
    let source = graph("Graph Nodes:\nA;B;C\n");
    let handle = cache.get_derived(&source).unwrap();
    assert_eq!(read_graph(&handle).node_count(), 3);
    assert_eq!(read_graph(&handle).edge_count(), 0);
}

#[test]
fn test_precondition_failure_caches_nothing() {
    let cache = counting_cache();
    let cyclic = graph("A --> B\nB --> C\nC --> A\n");

    let err = cache.get_derived(&cyclic).unwrap_err();
    assert!(matches!(err, CacheError::Precondition(_)));
    assert!(cache.is_empty());
    assert!(!cache.contains(&cyclic));
    assert_eq!(cache.stats().failures, 1);
}

#[test]
fn test_precondition_failure_keeps_existing_entry() {
    let cache = counting_cache();
    let mut source = abc();
    let handle = cache.get_derived(&source).unwrap();
    let before = read_graph(&handle).clone();

    source.add_directed_edge("C", "A").unwrap();
    let err = cache.get_derived(&source).unwrap_err();
    assert!(matches!(err, CacheError::Precondition(_)));
    assert!(cache.contains(&source));
    assert_eq!(*read_graph(&handle), before);

    source.remove_edge("C", "A").unwrap();
    let again = cache.get_derived(&source).unwrap();
    assert!(same_handle(&handle, &again));
}

#[test]
fn test_cancelled_lookup_touches_nothing() {
    let cache = counting_cache();
    let source = abc();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = cache.get_derived_cancellable(&source, &cancel).unwrap_err();
    assert_eq!(err, CacheError::Cancelled);
    assert!(cache.is_empty());
    assert_eq!(cache.transform().calls(), 0);
    assert_eq!(cache.stats().cancelled, 1);

    cancel.reset();
    let handle = cache.get_derived_cancellable(&source, &cancel).unwrap();
    assert!(same_handle(&handle, &cache.get_derived(&source).unwrap()));
}

#[test]
fn test_cancel_flag_is_shared_between_clones() {
    let flag = CancelFlag::new();
    let other = flag.clone();
    assert!(!other.is_cancelled());
    flag.cancel();
    assert!(other.is_cancelled());
    other.reset();
    assert!(!flag.is_cancelled());
}

#[test]
fn test_concurrent_callers_share_one_transform() {
    let cache = DerivedCache::new(Counting::slow(Duration::from_millis(50)));
    let source = abc();

    let handles: Vec<SharedGraph> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(|| cache.get_derived(&source).unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(cache.transform().calls(), 1);
    assert!(handles.iter().all(|h| same_handle(h, &handles[0])));
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.misses + stats.hits + stats.joined, 8);
}

#[test]
fn test_distinct_sources_in_parallel() {
    let cache = counting_cache();
    let sources: Vec<Graph> = (0..16).map(|_| abc()).collect();

    let handles: Vec<SharedGraph> = sources
        .par_iter()
        .map(|source| cache.get_derived(source).unwrap())
        .collect();

    assert_eq!(cache.len(), 16);
    assert_eq!(cache.transform().calls(), 16);
    for (i, a) in handles.iter().enumerate() {
        for b in &handles[i + 1..] {
            assert!(!same_handle(a, b));
        }
    }
}

#[test]
fn test_other_keys_do_not_wait_on_slow_key() {
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);

    let gated = FnTransform::new("gated", move |source: &Graph| {
        if source.contains_node("Slow") {
            let _ = started_tx.lock().send(());
            let _ = release_rx.lock().recv();
        }
        DagToPag.transform(source)
    });
    let cache = DerivedCache::new(gated);
    let slow = graph("Slow --> B\n");
    let fast = abc();

    thread::scope(|s| {
        let worker = s.spawn(|| cache.get_derived(&slow));
        started_rx.recv().unwrap();

        // Completes while the slow key is still in flight.
        assert!(cache.get_derived(&fast).is_ok());
        assert!(cache.contains(&fast));

        release_tx.send(()).unwrap();
        assert!(worker.join().unwrap().is_ok());
    });
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_failure_reaches_joined_callers_then_retries() {
    let failing = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&failing);
    let flaky = FnTransform::new("flaky", move |source: &Graph| {
        thread::sleep(Duration::from_millis(30));
        if flag.load(Ordering::SeqCst) {
            return Err(TransformError::failed("backend unavailable"));
        }
        DagToPag.transform(source)
    });
    let cache = DerivedCache::new(flaky);
    let source = abc();

    let results: Vec<_> = thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| s.spawn(|| cache.get_derived(&source)))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(matches!(err, CacheError::Transform(_)));
        assert!(err.to_string().contains("backend unavailable"));
    }
    assert!(cache.is_empty());

    failing.store(false, Ordering::SeqCst);
    let handle = cache.get_derived(&source).unwrap();
    assert!(cache.contains(&source));
    assert!(same_handle(&handle, &cache.get_derived(&source).unwrap()));
}

#[test]
fn test_concurrent_retry_after_failure_keeps_one_handle() {
    for _ in 0..300 {
        let failed = Arc::new(AtomicBool::new(false));
        let built = Arc::new(AtomicUsize::new(0));
        let (seen, count) = (Arc::clone(&failed), Arc::clone(&built));
        let fail_once = FnTransform::new("fail-once", move |source: &Graph| {
            if !seen.swap(true, Ordering::SeqCst) {
                return Err(TransformError::failed("first attempt fails"));
            }
            count.fetch_add(1, Ordering::SeqCst);
            DagToPag.transform(source)
        });
        let cache = DerivedCache::new(fail_once);
        let source = abc();

        let handles: Vec<SharedGraph> = thread::scope(|s| {
            let workers: Vec<_> = (0..12)
                .map(|_| {
                    s.spawn(|| loop {
                        if let Ok(handle) = cache.get_derived(&source) {
                            return handle;
                        }
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let cached = cache.get_derived(&source).unwrap();
        assert!(handles.iter().all(|h| same_handle(h, &cached)));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}

#[test]
fn test_panicking_transform_releases_the_key() {
    let panicked = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&panicked);
    let once = FnTransform::new("panics-once", move |source: &Graph| {
        if !seen.swap(true, Ordering::SeqCst) {
            panic!("transform blew up");
        }
        DagToPag.transform(source)
    });
    let cache = DerivedCache::new(once);
    let source = abc();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.get_derived(&source)
    }));
    assert!(caught.is_err());
    assert!(panicked.load(Ordering::SeqCst));

    assert!(cache.get_derived(&source).is_ok());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_capacity_evicts_least_recently_used() {
    let config = CacheConfig::default().with_capacity(2);
    let cache = DerivedCache::with_config(Counting::default(), config).unwrap();
    let (g1, g2, g3) = (abc(), abc(), abc());

    cache.get_derived(&g1).unwrap();
    cache.get_derived(&g2).unwrap();
    cache.get_derived(&g1).unwrap();
    cache.get_derived(&g3).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&g1));
    assert!(!cache.contains(&g2));
    assert!(cache.contains(&g3));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_entry_count_follows_every_removal() {
    let config = CacheConfig::default().with_capacity(3);
    let cache = DerivedCache::with_config(Counting::default(), config).unwrap();
    let sources: Vec<Graph> = (0..10).map(|_| abc()).collect();

    for source in &sources {
        cache.get_derived(source).unwrap();
        assert!(cache.len() <= 3);
    }
    let stats = cache.stats();
    assert_eq!((stats.entries, stats.evictions), (3, 7));

    let last = &sources[9];
    assert!(cache.invalidate(last));
    assert_eq!(cache.len(), 2);

    let cyclic = graph("A --> B\nB --> C\nC --> A\n");
    assert!(cache.get_derived(&cyclic).is_err());
    assert_eq!(cache.len(), 2);

    cache.get_derived(last).unwrap();
    cache.get_derived(last).unwrap();
    assert_eq!(cache.len(), 3);

    cache.clear();
    assert_eq!(cache.len(), 0);
    cache.get_derived(last).unwrap();
    assert_eq!(cache.stats().entries, 1);
}

#[test]
fn test_lookups_by_instance_ignore_source_structure() {
    let cache = counting_cache();
    let mut source = abc();
    cache.get_derived(&source).unwrap();

    source.add_directed_edge("A", "C").unwrap();
    assert!(cache.contains(&source));
    assert!(cache.invalidate(&source));
    assert!(!cache.contains(&source));
}

#[test]
fn test_lookups_by_structure_follow_source_structure() {
    let config = CacheConfig::default().with_key_mode(KeyMode::Structure);
    let cache = DerivedCache::with_config(Counting::default(), config).unwrap();
    let mut source = abc();
    cache.get_derived(&source).unwrap();

    source.add_directed_edge("A", "C").unwrap();
    assert!(!cache.contains(&source));
    assert!(!cache.invalidate(&source));
    assert!(cache.contains(&abc()));
    assert!(cache.invalidate(&abc()));
    assert!(cache.is_empty());
}

#[test]
fn test_structure_keying_shares_entries() {
    let config = CacheConfig::default().with_key_mode(KeyMode::Structure);
    let cache = DerivedCache::with_config(Counting::default(), config).unwrap();
    let a = abc();
    let b = graph("B --> C\nA --> B\n");
    assert_ne!(a.id(), b.id());

    let ha = cache.get_derived(&a).unwrap();
    let hb = cache.get_derived(&b).unwrap();
    assert!(same_handle(&ha, &hb));
    assert_eq!(cache.transform().calls(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_instance_keying_separates_equal_sources() {
    let cache = counting_cache();
    let a = abc();
    let b = a.clone();

    let ha = cache.get_derived(&a).unwrap();
    let hb = cache.get_derived(&b).unwrap();
    assert!(!same_handle(&ha, &hb));
    assert_eq!(*read_graph(&ha), *read_graph(&hb));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_invalidate_and_clear() {
    let cache = counting_cache();
    let a = abc();
    let b = abc();
    let first = cache.get_derived(&a).unwrap();
    cache.get_derived(&b).unwrap();

    assert!(cache.invalidate(&a));
    assert!(!cache.invalidate(&a));
    assert_eq!(cache.len(), 1);

    let fresh = cache.get_derived(&a).unwrap();
    assert!(!same_handle(&first, &fresh));

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = CacheConfig {
        shard_amount: Some(6),
        ..CacheConfig::default()
    };
    assert!(matches!(
        DerivedCache::with_config(DagToPag, config),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_debug_names_transform() {
    let cache = PagCache::default();
    let text = format!("{cache:?}");
    assert!(text.starts_with("DerivedCache"));
    assert!(text.contains("dag-to-pag"));
}
