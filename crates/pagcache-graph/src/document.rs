//! Serde form of a graph: plain node and edge lists.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::{Edge, Node};

/// Serializable snapshot of a graph's nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        GraphDocument {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().collect(),
        }
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        GraphDocument::from(&graph)
    }
}

impl TryFrom<GraphDocument> for Graph {
    type Error = GraphError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in doc.nodes {
            graph.add_node(node)?;
        }
        for edge in doc.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}
