//! Integration tests for pagcache
//!
//! These tests drive the graph, transform and cache crates together, and the
//! CLI binary end to end.

use pagcache_graph::{Endpoint, Fingerprint, Graph};
use pagcache_store::{
    CacheConfig, CacheError, KeyMode, PagCache, read_graph, same_handle, write_graph,
};
use pagcache_transform::{DagToPag, Transform};
use std::io::Write;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const CONFOUNDED: &str = "\
Graph Nodes:
X;Y;Z;W;L

Latent Nodes:
L

Graph Edges:
1. X --> Y
2. L --> Y
3. L --> Z
4. Z --> W
";

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn pagcache() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pagcache"))
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = pagcache().arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Memoized DAG to PAG conversion"));
}

#[test]
fn test_cli_version() {
    let output = pagcache().arg("version").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("pagcache v"));
}

#[test]
fn test_cli_pag_matches_library() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "confounded.txt", CONFOUNDED);

    let output = pagcache().arg("pag").arg(&path).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let printed: Graph = String::from_utf8_lossy(&output.stdout).parse().unwrap();
    let expected = DagToPag.transform(&CONFOUNDED.parse().unwrap()).unwrap();
    assert_eq!(printed, expected);
    assert!(!printed.contains_node("L"));
}

#[test]
fn test_cli_pag_json() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "chain.txt", "A --> B\nB --> C\n");

    let output = pagcache().args(["pag", "--json"]).arg(&path).output().unwrap();
    assert!(output.status.success());

    let printed: Graph = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed, "A o-o B\nB o-o C\n".parse::<Graph>().unwrap());
}

#[test]
fn test_cli_rejects_cycle() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "cycle.txt", "A --> B\nB --> A\n");
    // Parsing rejects the second edge between the same pair.
    let output = pagcache().arg("pag").arg(&path).output().unwrap();
    assert!(!output.status.success());

    let path = write_file(&dir, "cycle3.txt", "A --> B\nB --> C\nC --> A\n");
    let output = pagcache().arg("pag").arg(&path).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cycle"));
}

#[test]
fn test_cli_fingerprint_ignores_order() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.txt", "A --> B\nB --> C\n");
    let b = write_file(&dir, "b.txt", "B --> C\nA --> B\n");

    let fa = pagcache().arg("fingerprint").arg(&a).output().unwrap().stdout;
    let fb = pagcache().arg("fingerprint").arg(&b).output().unwrap().stdout;
    assert_eq!(fa, fb);
    assert_eq!(String::from_utf8_lossy(&fa).trim().len(), 32);
}

#[test]
fn test_cli_stress_with_config() {
    let dir = TempDir::new().unwrap();
    let graph = write_file(&dir, "g.txt", "A --> C\nB --> C\nC --> D\n");
    let config = write_file(&dir, "cache.toml", "key_mode = \"structure\"\ncapacity = 4\n");

    let output = pagcache()
        .arg("--config")
        .arg(&config)
        .args(["stress", "--workers", "4", "--rounds", "25"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_end = stdout.rfind('}').unwrap();
    let stats: serde_json::Value = serde_json::from_str(&stdout[..=json_end]).unwrap();
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["rebuilds"], 0);
    assert_eq!(stats["entries"], 1);
}

#[test]
fn test_cli_bad_config() {
    let dir = TempDir::new().unwrap();
    let graph = write_file(&dir, "g.txt", "A --> B\n");
    let config = write_file(&dir, "cache.toml", "capacity = 0\n");

    let output = pagcache()
        .arg("--config")
        .arg(&config)
        .arg("pag")
        .arg(&graph)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("capacity"));
}

/// A search loop: workers share one cache and one evolving source.
#[test]
fn test_search_session() {
    let cache = Arc::new(PagCache::default());
    let mut source: Graph = CONFOUNDED.parse().unwrap();

    let first = cache.get_derived(&source).unwrap();
    let scored: Vec<usize> = thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let source = &source;
                s.spawn(move || {
                    let handle = cache.get_derived(source).unwrap();
                    read_graph(&handle).edge_count()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(scored.iter().all(|&n| n == read_graph(&first).edge_count()));

    // A scorer scribbles on the shared PAG; the next lookup repairs it.
    write_graph(&first)
        .set_endpoint("Y", "X", Endpoint::Arrow)
        .unwrap();
    let repaired = cache.get_derived(&source).unwrap();
    assert!(same_handle(&first, &repaired));
    assert_eq!(*read_graph(&repaired), DagToPag.transform(&source).unwrap());

    // The search moves to a neighbouring DAG.
    source.add_directed_edge("X", "W").unwrap();
    let moved = cache.get_derived(&source).unwrap();
    assert!(!same_handle(&first, &moved));
    assert!(read_graph(&moved).is_adjacent("X", "W"));

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.repairs, 1);
    assert_eq!(stats.rebuilds, 1);
}

#[test]
fn test_structure_keyed_cache_across_copies() {
    let config = CacheConfig::default().with_key_mode(KeyMode::Structure);
    let cache = PagCache::with_config(DagToPag, config).unwrap();
    let source: Graph = CONFOUNDED.parse().unwrap();
    let copy = source.clone();
    assert_eq!(Fingerprint::of(&source), Fingerprint::of(&copy));

    let a = cache.get_derived(&source).unwrap();
    let b = cache.get_derived(&copy).unwrap();
    assert!(same_handle(&a, &b));
}

#[test]
fn test_json_source_round_trip() {
    let source: Graph = CONFOUNDED.parse().unwrap();
    let json = serde_json::to_string(&source).unwrap();
    let back: Graph = serde_json::from_str(&json).unwrap();

    let cache = PagCache::default();
    let a = cache.get_derived(&source).unwrap();
    let b = cache.get_derived(&back).unwrap();
    assert!(!same_handle(&a, &b));
    assert_eq!(*read_graph(&a), *read_graph(&b));
}

#[test]
fn test_precondition_error_is_reported() {
    let cache = PagCache::default();
    let source: Graph = "A --> B\nB o-> C\n".parse().unwrap();
    let err = cache.get_derived(&source).unwrap_err();
    assert!(matches!(err, CacheError::Precondition(_)));
    assert!(cache.is_empty());
}
