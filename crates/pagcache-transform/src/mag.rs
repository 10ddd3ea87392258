//! DAG → MAG: marginalize latent variables.
//!
//! Two measured nodes are adjacent in the MAG iff an inducing path joins them
//! in the DAG: a path on which every measured interior node is a collider and
//! every collider is an ancestor of one of the two ends. The edge is
//! `x --> y` when `x` is an ancestor of `y`, `y --> x` for the reverse, and
//! `x <-> y` otherwise.

use std::collections::{HashMap, HashSet};

use pagcache_graph::{Edge, Endpoint, Graph, NodeId};
use tracing::trace;

use crate::dag::check_dag;
use crate::error::TransformError;

/// Convert a DAG (possibly with latent nodes) into its maximal ancestral graph.
pub fn dag_to_mag(dag: &Graph) -> Result<Graph, TransformError> {
    check_dag(dag)?;

    let measured: Vec<NodeId> = dag
        .node_ids()
        .into_iter()
        .filter(|&id| dag.node_by_id(id).is_some_and(|n| !n.is_latent()))
        .collect();

    // Without latents every inducing path is an edge, so the MAG is the DAG.
    if measured.len() == dag.node_count() {
        return Ok(dag.clone());
    }

    let ancestors: HashMap<NodeId, HashSet<NodeId>> = dag
        .node_ids()
        .into_iter()
        .map(|id| (id, dag.ancestors(id)))
        .collect();

    let mut mag = Graph::new();
    for &id in &measured {
        if let Some(node) = dag.node_by_id(id) {
            mag.add_node(node.clone()).map_err(|e| TransformError::failed(e.to_string()))?;
        }
    }

    for (i, &x) in measured.iter().enumerate() {
        for &y in &measured[i + 1..] {
            let anc_x = &ancestors[&x];
            let anc_y = &ancestors[&y];
            if !has_inducing_path(dag, x, y, anc_x, anc_y) {
                continue;
            }
            let (Some(nx), Some(ny)) = (dag.name_of(x), dag.name_of(y)) else {
                continue;
            };
            let edge = if anc_y.contains(&x) {
                Edge::directed(nx, ny)
            } else if anc_x.contains(&y) {
                Edge::directed(ny, nx)
            } else {
                Edge::bidirected(nx, ny)
            };
            trace!("MAG edge {}", edge);
            mag.add_edge(edge).map_err(|e| TransformError::failed(e.to_string()))?;
        }
    }

    Ok(mag)
}

fn has_inducing_path(
    dag: &Graph,
    x: NodeId,
    y: NodeId,
    anc_x: &HashSet<NodeId>,
    anc_y: &HashSet<NodeId>,
) -> bool {
    let mut on_path = HashSet::from([x]);
    for next in dag.adjacent_ids(x) {
        if next == y {
            return true;
        }
        let into_next = dag.mark(x, next) == Some(Endpoint::Arrow);
        on_path.insert(next);
        if extend(dag, next, into_next, y, anc_x, anc_y, &mut on_path) {
            return true;
        }
        on_path.remove(&next);
    }
    false
}

/// Depth-first search over simple paths. `into_curr` records whether the
/// edge we arrived on has an arrowhead at `curr`.
fn extend(
    dag: &Graph,
    curr: NodeId,
    into_curr: bool,
    y: NodeId,
    anc_x: &HashSet<NodeId>,
    anc_y: &HashSet<NodeId>,
    on_path: &mut HashSet<NodeId>,
) -> bool {
    let latent = dag.node_by_id(curr).is_some_and(|n| n.is_latent());
    let ancestor = anc_x.contains(&curr) || anc_y.contains(&curr);

    for next in dag.adjacent_ids(curr) {
        if on_path.contains(&next) {
            continue;
        }
        let collider = into_curr && dag.mark(next, curr) == Some(Endpoint::Arrow);
        let allowed = if collider { ancestor } else { latent };
        if !allowed {
            continue;
        }
        if next == y {
            return true;
        }
        let into_next = dag.mark(curr, next) == Some(Endpoint::Arrow);
        on_path.insert(next);
        if extend(dag, next, into_next, y, anc_x, anc_y, on_path) {
            return true;
        }
        on_path.remove(&next);
    }
    false
}
