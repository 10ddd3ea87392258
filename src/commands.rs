//! CLI command implementations

use anyhow::Context;
use pagcache_graph::{Fingerprint, Graph};
use pagcache_store::{CacheConfig, PagCache, read_graph, same_handle, write_graph};
use pagcache_transform::{DagToPag, Transform};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

/// Read a graph from the text format, or from JSON when the file ends in `.json`.
pub fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read graph file {}", path.display()))?;

    let graph: Graph = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid graph document {}", path.display()))?
    } else {
        content
            .parse()
            .with_context(|| format!("Invalid graph file {}", path.display()))?
    };

    tracing::debug!(
        "Loaded {} ({} nodes, {} edges)",
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<CacheConfig> {
    match path {
        Some(path) => {
            let config = CacheConfig::load(path)?;
            tracing::debug!("Loaded cache config from {}: {:?}", path.display(), config);
            Ok(config)
        }
        None => Ok(CacheConfig::default()),
    }
}

pub fn pag(file: &Path, config: CacheConfig, json: bool) -> anyhow::Result<()> {
    let source = load_graph(file)?;
    let cache = PagCache::with_config(DagToPag, config)?;

    let handle = cache.get_derived(&source)?;
    let pag = read_graph(&handle);
    if json {
        println!("{}", serde_json::to_string_pretty(&*pag)?);
    } else {
        print!("{}", *pag);
    }
    Ok(())
}

pub fn fingerprint(file: &Path) -> anyhow::Result<()> {
    let graph = load_graph(file)?;
    println!("{}", Fingerprint::of(&graph));
    Ok(())
}

/// Every tenth task wipes the shared PAG; every lookup must still return the
/// original handle with canonical contents restored.
pub fn stress(file: &Path, config: CacheConfig, workers: usize, rounds: usize) -> anyhow::Result<()> {
    let source = load_graph(file)?;
    let cache = PagCache::with_config(DagToPag, config)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Cannot start worker pool")?;

    tracing::info!("Stressing {} with {} workers x {} rounds", file.display(), workers, rounds);

    let first = cache.get_derived(&source)?;
    let start = Instant::now();
    let mismatched: usize = pool.install(|| {
        (0..workers.max(1) * rounds)
            .into_par_iter()
            .map(|task| match cache.get_derived(&source) {
                Ok(handle) => {
                    if task % 10 == 9 {
                        write_graph(&handle).clear();
                    }
                    usize::from(!same_handle(&handle, &first))
                }
                Err(e) => {
                    tracing::warn!("Lookup failed: {}", e);
                    1
                }
            })
            .sum()
    });
    let elapsed = start.elapsed();

    let last = cache.get_derived(&source)?;
    let canonical = DagToPag.transform(&source)?;

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    println!("elapsed: {:?}", elapsed);

    if mismatched > 0 {
        anyhow::bail!("{} lookups returned a different handle or failed", mismatched);
    }
    if !same_handle(&first, &last) || *read_graph(&last) != canonical {
        anyhow::bail!("Cached PAG was not restored after the run");
    }
    tracing::info!("Handle stayed stable across {} lookups", workers.max(1) * rounds);
    Ok(())
}
