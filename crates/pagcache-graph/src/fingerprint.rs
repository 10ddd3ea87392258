//! Structural fingerprints.
//!
//! A fingerprint is computed from a canonical encoding of the graph: node
//! names and kinds, and every edge's two nodes and endpoint marks. The
//! encoding does not depend on insertion order, storage direction, internal
//! indices, node positions, or object identity.
//!
//! Comparison uses the XXH3-128 digest as a fast path and the encoding itself
//! as ground truth, so two fingerprints are equal exactly when the graphs are
//! structurally equal.

use std::fmt;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::graph::Graph;
use crate::model::NodeKind;

/// Comparable structural signature of a [`Graph`].
#[derive(Clone)]
pub struct Fingerprint {
    digest: u128,
    encoding: Arc<str>,
}

impl Fingerprint {
    pub fn of(graph: &Graph) -> Self {
        let encoding = canonical_encoding(graph);
        Fingerprint {
            digest: xxhash_rust::xxh3::xxh3_128(encoding.as_bytes()),
            encoding: encoding.into(),
        }
    }

    pub fn digest(&self) -> u128 {
        self.digest
    }

    /// The canonical encoding this fingerprint was computed from.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

/// Shorthand for [`Fingerprint::of`].
pub fn fingerprint(graph: &Graph) -> Fingerprint {
    Fingerprint::of(graph)
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
            && (Arc::ptr_eq(&self.encoding, &other.encoding) || self.encoding == other.encoding)
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.digest)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:08x}..)", (self.digest >> 96) as u32)
    }
}

/// Canonical text encoding of a graph's structure.
///
/// Names are length-prefixed so no choice of characters in a name can make
/// two different graphs encode the same way.
pub fn canonical_encoding(graph: &Graph) -> String {
    let mut nodes: Vec<String> = graph
        .nodes()
        .map(|n| {
            let kind = match n.kind {
                NodeKind::Measured => 'm',
                NodeKind::Latent => 'l',
            };
            format!("{}:{}:{}", n.name.len(), n.name, kind)
        })
        .collect();
    nodes.sort_unstable();

    let mut edges: Vec<String> = graph
        .edges()
        .map(|e| {
            let e = e.canonical();
            format!(
                "{}:{}|{}:{}|{}{}",
                e.node1.len(),
                e.node1,
                e.node2.len(),
                e.node2,
                e.endpoint1.code(),
                e.endpoint2.code()
            )
        })
        .collect();
    edges.sort_unstable();

    let mut out = String::with_capacity(16 * (nodes.len() + edges.len()) + 32);
    let _ = writeln!(out, "nodes {}", nodes.len());
    for n in &nodes {
        out.push_str(n);
        out.push('\n');
    }
    let _ = writeln!(out, "edges {}", edges.len());
    for e in &edges {
        out.push_str(e);
        out.push('\n');
    }
    out
}
