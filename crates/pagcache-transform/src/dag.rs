//! DAG precondition checks.

use crate::error::TransformError;
use pagcache_graph::{Graph, NodeId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Verify that every edge is `-->` and that there is no directed cycle.
pub fn check_dag(graph: &Graph) -> Result<(), TransformError> {
    for edge in graph.edges() {
        if !edge.is_directed() {
            return Err(TransformError::NotADag {
                reason: format!("edge `{edge}` is not directed"),
            });
        }
    }
    topological_order(graph).map(|_| ())
}

pub fn is_dag(graph: &Graph) -> bool {
    check_dag(graph).is_ok()
}

/// Nodes ordered so every parent precedes its children.
pub fn topological_order(graph: &Graph) -> Result<Vec<NodeId>, TransformError> {
    let mut dg: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    for id in graph.node_ids() {
        index.insert(id, dg.add_node(id));
    }
    for id in graph.node_ids() {
        for child in graph.child_ids(id) {
            dg.add_edge(index[&id], index[&child], ());
        }
    }

    toposort(&dg, None)
        .map(|order| order.into_iter().map(|idx| dg[idx]).collect())
        .map_err(|cycle| {
            let at = graph.name_of(dg[cycle.node_id()]).unwrap_or("?");
            TransformError::NotADag {
                reason: format!("directed cycle through `{at}`"),
            }
        })
}
