//! pagcache-graph — mixed causal graph model and structural fingerprints

pub mod document;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod model;
pub mod text;


pub use document::GraphDocument;
pub use error::GraphError;
pub use fingerprint::{Fingerprint, canonical_encoding, fingerprint};
pub use graph::Graph;
pub use model::{Edge, Endpoint, GraphId, Node, NodeId, NodeKind, Position};
