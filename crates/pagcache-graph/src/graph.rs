//! Graph wrapper using petgraph::StableDiGraph with name-indexed nodes

use crate::document::GraphDocument;
use crate::error::GraphError;
use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Endpoint marks of a stored edge, keyed by petgraph's storage direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marks {
    at_source: Endpoint,
    at_target: Endpoint,
}

/// A mixed graph of uniquely named nodes with at most one edge per pair.
///
/// Edges are stored in the direction they were added; every query is
/// orientation agnostic. Equality is structural (see [`crate::fingerprint`]),
/// while [`Graph::id`] gives object identity.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    id: GraphId,
    inner: StableDiGraph<Node, Marks>,
    names: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            id: GraphId::fresh(),
            inner: StableDiGraph::new(),
            names: HashMap::new(),
        }
    }

    /// Identity of this object. Survives in-place mutation, not cloning.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Add a node. Names are unique.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.names.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        let name = node.name.clone();
        let idx = self.inner.add_node(node);
        self.names.insert(name, idx);
        Ok(NodeId(idx.index() as u64))
    }

    /// Add a measured node.
    pub fn add_variable(&mut self, name: &str) -> Result<NodeId, GraphError> {
        self.add_node(Node::measured(name))
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, name: &str) -> Option<Node> {
        let idx = self.names.remove(name)?;
        self.inner.remove_node(idx)
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        let idx = *self.names.get(name)?;
        self.inner.node_weight(idx)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).map(|idx| NodeId(idx.index() as u64))
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.inner
            .node_weight(NodeIndex::new(id.0 as usize))
            .map(|n| n.name.as_str())
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.inner.node_weight(NodeIndex::new(id.0 as usize))
    }

    /// Move a node on screen. Does not change structure.
    pub fn set_position(&mut self, name: &str, x: f64, y: f64) -> Result<(), GraphError> {
        let idx = self.index_of(name)?;
        if let Some(node) = self.inner.node_weight_mut(idx) {
            node.position = Some(Position { x, y });
        }
        Ok(())
    }

    pub fn set_node_kind(&mut self, name: &str, kind: NodeKind) -> Result<(), GraphError> {
        let idx = self.index_of(name)?;
        if let Some(node) = self.inner.node_weight_mut(idx) {
            node.kind = kind;
        }
        Ok(())
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.inner
            .node_indices()
            .map(|idx| NodeId(idx.index() as u64))
            .collect()
    }

    /// Add an edge between two existing, non-adjacent nodes.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let a = self.index_of(&edge.node1)?;
        let b = self.index_of(&edge.node2)?;
        if a == b {
            return Err(GraphError::SelfLoop(edge.node1));
        }
        if self.find(a, b).is_some() {
            return Err(GraphError::AlreadyAdjacent(edge.node1, edge.node2));
        }
        self.inner.add_edge(
            a,
            b,
            Marks {
                at_source: edge.endpoint1,
                at_target: edge.endpoint2,
            },
        );
        Ok(())
    }

    /// Add `from --> to`.
    pub fn add_directed_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.add_edge(Edge::directed(from, to))
    }

    /// Remove the edge between two nodes, returning it as written from `a`.
    pub fn remove_edge(&mut self, a: &str, b: &str) -> Option<Edge> {
        let edge = self.edge(a, b)?;
        let (ia, ib) = (*self.names.get(a)?, *self.names.get(b)?);
        let (idx, _) = self.find(ia, ib)?;
        self.inner.remove_edge(idx);
        Some(edge)
    }

    /// The edge between two nodes, written with `a` as `node1`.
    pub fn edge(&self, a: &str, b: &str) -> Option<Edge> {
        let ia = *self.names.get(a)?;
        let ib = *self.names.get(b)?;
        let (idx, forward) = self.find(ia, ib)?;
        let marks = self.inner.edge_weight(idx)?;
        let (e1, e2) = if forward {
            (marks.at_source, marks.at_target)
        } else {
            (marks.at_target, marks.at_source)
        };
        Some(Edge::new(a, b, e1, e2))
    }

    /// Iterate over all edges in insertion order, as they were added.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.inner.edge_indices().filter_map(move |idx| {
            let (s, t) = self.inner.edge_endpoints(idx)?;
            let marks = self.inner.edge_weight(idx)?;
            Some(Edge::new(
                self.inner.node_weight(s)?.name.clone(),
                self.inner.node_weight(t)?.name.clone(),
                marks.at_source,
                marks.at_target,
            ))
        })
    }

    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        match (self.names.get(a), self.names.get(b)) {
            (Some(&ia), Some(&ib)) => self.find(ia, ib).is_some(),
            _ => false,
        }
    }

    /// Mark at `to` on the edge `from *-* to`.
    pub fn endpoint(&self, from: &str, to: &str) -> Option<Endpoint> {
        let a = self.node_id(from)?;
        let b = self.node_id(to)?;
        self.mark(a, b)
    }

    /// Set the mark at `to` on the edge `from *-* to`.
    pub fn set_endpoint(&mut self, from: &str, to: &str, endpoint: Endpoint) -> Result<(), GraphError> {
        let a = self.index_of(from)?;
        let b = self.index_of(to)?;
        if self.set_mark(
            NodeId(a.index() as u64),
            NodeId(b.index() as u64),
            endpoint,
        ) {
            Ok(())
        } else {
            Err(GraphError::NotAdjacent(from.to_string(), to.to_string()))
        }
    }

    /// Names of all nodes adjacent to `name`.
    pub fn adjacent_nodes(&self, name: &str) -> Vec<&str> {
        match self.node_id(name) {
            Some(id) => self
                .adjacent_ids(id)
                .into_iter()
                .filter_map(|n| self.name_of(n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes `p` with `p --> name`.
    pub fn parents(&self, name: &str) -> Vec<&str> {
        match self.node_id(name) {
            Some(id) => self
                .parent_ids(id)
                .into_iter()
                .filter_map(|n| self.name_of(n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes `c` with `name --> c`.
    pub fn children(&self, name: &str) -> Vec<&str> {
        match self.node_id(name) {
            Some(id) => self
                .child_ids(id)
                .into_iter()
                .filter_map(|n| self.name_of(n))
                .collect(),
            None => Vec::new(),
        }
    }

    // ── Index-based access for graph algorithms ─────────────

    /// Neighbours of a node, sorted by index.
    pub fn adjacent_ids(&self, id: NodeId) -> Vec<NodeId> {
        let idx = NodeIndex::new(id.0 as usize);
        if !self.inner.contains_node(idx) {
            return Vec::new();
        }
        let mut out: Vec<NodeId> = self
            .inner
            .neighbors_undirected(idx)
            .map(|n| NodeId(n.index() as u64))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn is_adjacent_ids(&self, a: NodeId, b: NodeId) -> bool {
        self.find(NodeIndex::new(a.0 as usize), NodeIndex::new(b.0 as usize))
            .is_some()
    }

    /// Mark at `to` on the edge `from *-* to`.
    pub fn mark(&self, from: NodeId, to: NodeId) -> Option<Endpoint> {
        let (idx, forward) = self.find(
            NodeIndex::new(from.0 as usize),
            NodeIndex::new(to.0 as usize),
        )?;
        let marks = self.inner.edge_weight(idx)?;
        Some(if forward {
            marks.at_target
        } else {
            marks.at_source
        })
    }

    /// Set the mark at `to` on the edge `from *-* to`. False if not adjacent.
    pub fn set_mark(&mut self, from: NodeId, to: NodeId, endpoint: Endpoint) -> bool {
        let Some((idx, forward)) = self.find(
            NodeIndex::new(from.0 as usize),
            NodeIndex::new(to.0 as usize),
        ) else {
            return false;
        };
        match self.inner.edge_weight_mut(idx) {
            Some(marks) => {
                if forward {
                    marks.at_target = endpoint;
                } else {
                    marks.at_source = endpoint;
                }
                true
            }
            None => false,
        }
    }

    /// `a --> b`
    pub fn is_parent_of(&self, a: NodeId, b: NodeId) -> bool {
        self.mark(b, a) == Some(Endpoint::Tail) && self.mark(a, b) == Some(Endpoint::Arrow)
    }

    pub fn parent_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.adjacent_ids(id)
            .into_iter()
            .filter(|&p| self.is_parent_of(p, id))
            .collect()
    }

    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.adjacent_ids(id)
            .into_iter()
            .filter(|&c| self.is_parent_of(id, c))
            .collect()
    }

    /// All proper ancestors of a node along directed edges.
    pub fn ancestors(&self, node: NodeId) -> HashSet<NodeId> {
        let mut ancestors = HashSet::new();
        let mut to_visit = vec![node];

        while let Some(current) = to_visit.pop() {
            for parent in self.parent_ids(current) {
                if ancestors.insert(parent) {
                    to_visit.push(parent);
                }
            }
        }

        ancestors
    }

    // ── Bulk mutation ───────────────────────────────────────

    /// Set every endpoint of every edge to `endpoint`.
    pub fn reorient_all(&mut self, endpoint: Endpoint) {
        let indices: Vec<EdgeIndex> = self.inner.edge_indices().collect();
        for idx in indices {
            if let Some(marks) = self.inner.edge_weight_mut(idx) {
                marks.at_source = endpoint;
                marks.at_target = endpoint;
            }
        }
    }

    /// Remove every node and edge. Keeps the graph's identity.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.names.clear();
    }

    /// Overwrite this graph's contents with a structural copy of `other`.
    ///
    /// Goes through `clear`, `add_node` and `add_edge`, so the result is
    /// exactly what any other writer would produce. Identity is preserved.
    pub fn replace_with(&mut self, other: &Graph) -> Result<(), GraphError> {
        self.clear();
        for node in other.nodes() {
            self.add_node(node.clone())?;
        }
        for edge in other.edges() {
            self.add_edge(edge)?;
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Edge joining `a` and `b`, and whether it is stored as `a -> b`.
    fn find(&self, a: NodeIndex, b: NodeIndex) -> Option<(EdgeIndex, bool)> {
        if let Some(idx) = self.inner.find_edge(a, b) {
            return Some((idx, true));
        }
        self.inner.find_edge(b, a).map(|idx| (idx, false))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Graph {
    /// A clone is a distinct object: same structure, fresh identity.
    fn clone(&self) -> Self {
        Graph {
            id: GraphId::fresh(),
            inner: self.inner.clone(),
            names: self.names.clone(),
        }
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        crate::fingerprint::canonical_encoding(self) == crate::fingerprint::canonical_encoding(other)
    }
}

impl Eq for Graph {}
