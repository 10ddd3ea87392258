//! Core data structures for causal graphs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a `Graph` value.
///
/// Assigned at construction and never reused. A clone is a new object and
/// receives a fresh id; mutating a graph in place keeps its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Stable index of a node inside one graph.
///
/// Only meaningful for the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u64);

/// Whether a variable is observed or marginalized away when building a MAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Measured,
    Latent,
}

/// Display coordinates. Purely cosmetic: never part of graph structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single named variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn measured(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::Measured,
            position: None,
        }
    }

    pub fn latent(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::Latent,
            position: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn is_latent(&self) -> bool {
        self.kind == NodeKind::Latent
    }
}

/// Mark at one end of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Tail,
    Arrow,
    Circle,
    /// No mark at all.
    Null,
}

impl Endpoint {
    /// Single-character code used by the canonical encoding.
    pub fn code(self) -> char {
        match self {
            Endpoint::Tail => '-',
            Endpoint::Arrow => '>',
            Endpoint::Circle => 'o',
            Endpoint::Null => '.',
        }
    }
}

/// An edge `node1 *-* node2`; `endpoint1` sits at `node1`, `endpoint2` at `node2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub node1: String,
    pub node2: String,
    pub endpoint1: Endpoint,
    pub endpoint2: Endpoint,
}

impl Edge {
    pub fn new(
        node1: impl Into<String>,
        node2: impl Into<String>,
        endpoint1: Endpoint,
        endpoint2: Endpoint,
    ) -> Self {
        Edge {
            node1: node1.into(),
            node2: node2.into(),
            endpoint1,
            endpoint2,
        }
    }

    /// `from --> to`
    pub fn directed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Edge::new(from, to, Endpoint::Tail, Endpoint::Arrow)
    }

    /// `a <-> b`
    pub fn bidirected(a: impl Into<String>, b: impl Into<String>) -> Self {
        Edge::new(a, b, Endpoint::Arrow, Endpoint::Arrow)
    }

    /// `a o-o b`
    pub fn nondirected(a: impl Into<String>, b: impl Into<String>) -> Self {
        Edge::new(a, b, Endpoint::Circle, Endpoint::Circle)
    }

    /// `a o-> b`
    pub fn partially_oriented(a: impl Into<String>, b: impl Into<String>) -> Self {
        Edge::new(a, b, Endpoint::Circle, Endpoint::Arrow)
    }

    /// `a --- b`
    pub fn undirected(a: impl Into<String>, b: impl Into<String>) -> Self {
        Edge::new(a, b, Endpoint::Tail, Endpoint::Tail)
    }

    /// Same edge written from the other side.
    pub fn reversed(&self) -> Self {
        Edge {
            node1: self.node2.clone(),
            node2: self.node1.clone(),
            endpoint1: self.endpoint2,
            endpoint2: self.endpoint1,
        }
    }

    /// Mark at the given node, if it is one of the edge's nodes.
    pub fn endpoint_at(&self, name: &str) -> Option<Endpoint> {
        if self.node1 == name {
            Some(self.endpoint1)
        } else if self.node2 == name {
            Some(self.endpoint2)
        } else {
            None
        }
    }

    /// True for `a --> b` in either orientation.
    pub fn is_directed(&self) -> bool {
        matches!(
            (self.endpoint1, self.endpoint2),
            (Endpoint::Tail, Endpoint::Arrow) | (Endpoint::Arrow, Endpoint::Tail)
        )
    }

    /// Orientation with the lexicographically smaller node first.
    pub fn canonical(&self) -> Self {
        if self.node1 <= self.node2 {
            self.clone()
        } else {
            self.reversed()
        }
    }
}
