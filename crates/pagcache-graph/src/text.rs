//! Plain-text graph format.
//!
//! ```text
//! Graph Nodes:
//! A;B;C
//!
//! Latent Nodes:
//! L
//!
//! Graph Edges:
//! 1. A --> B
//! 2. B o-> C
//! ```
//!
//! The parser is lenient: sections are optional, edge numbering is optional,
//! and nodes named by an edge but never declared are added as measured.

use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::{Edge, Endpoint, Node, NodeKind};

fn left_char(e: Endpoint) -> char {
    match e {
        Endpoint::Tail => '-',
        Endpoint::Arrow => '<',
        Endpoint::Circle => 'o',
        Endpoint::Null => '.',
    }
}

fn right_char(e: Endpoint) -> char {
    match e {
        Endpoint::Tail => '-',
        Endpoint::Arrow => '>',
        Endpoint::Circle => 'o',
        Endpoint::Null => '.',
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endpoint::Tail => "tail",
            Endpoint::Arrow => "arrow",
            Endpoint::Circle => "circle",
            Endpoint::Null => "null",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} {}",
            self.node1,
            left_char(self.endpoint1),
            right_char(self.endpoint2),
            self.node2
        )
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.nodes().map(|n| n.name.as_str()).collect();
        writeln!(f, "Graph Nodes:")?;
        writeln!(f, "{}", names.join(";"))?;

        let latents: Vec<&str> = self
            .nodes()
            .filter(|n| n.is_latent())
            .map(|n| n.name.as_str())
            .collect();
        if !latents.is_empty() {
            writeln!(f)?;
            writeln!(f, "Latent Nodes:")?;
            writeln!(f, "{}", latents.join(";"))?;
        }

        writeln!(f)?;
        writeln!(f, "Graph Edges:")?;
        for (i, edge) in self.edges().enumerate() {
            writeln!(f, "{}. {}", i + 1, edge)?;
        }
        Ok(())
    }
}

/// Parse an edge token such as `-->` or `o-o`.
fn parse_token(token: &str) -> Option<(Endpoint, Endpoint)> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() != 3 || chars[1] != '-' {
        return None;
    }
    let left = match chars[0] {
        '-' => Endpoint::Tail,
        '<' => Endpoint::Arrow,
        'o' => Endpoint::Circle,
        '.' => Endpoint::Null,
        _ => return None,
    };
    let right = match chars[2] {
        '-' => Endpoint::Tail,
        '>' => Endpoint::Arrow,
        'o' => Endpoint::Circle,
        '.' => Endpoint::Null,
        _ => return None,
    };
    Some((left, right))
}

impl FromStr for Edge {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_edge_line(s, 0)
    }
}

fn parse_edge_line(line: &str, line_no: usize) -> Result<Edge, GraphError> {
    let mut parts: Vec<&str> = line.split_whitespace().collect();
    // Optional "12." numbering.
    if let Some(first) = parts.first() {
        if let Some(num) = first.strip_suffix('.') {
            if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
                parts.remove(0);
            }
        }
    }
    let [a, token, b] = parts.as_slice() else {
        return Err(GraphError::Parse {
            line: line_no,
            reason: format!("expected `<node> <edge> <node>`, got `{}`", line.trim()),
        });
    };
    let (e1, e2) = parse_token(token).ok_or_else(|| GraphError::Parse {
        line: line_no,
        reason: format!("unknown edge token `{token}`"),
    })?;
    Ok(Edge::new(*a, *b, e1, e2))
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Nodes,
    Latents,
    Edges,
}

impl FromStr for Graph {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut graph = Graph::new();
        let mut section = Section::Edges;

        for (i, raw) in s.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line {
                "Graph Nodes:" => {
                    section = Section::Nodes;
                    continue;
                }
                "Latent Nodes:" => {
                    section = Section::Latents;
                    continue;
                }
                "Graph Edges:" => {
                    section = Section::Edges;
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Nodes => {
                    for name in line.split(';').map(str::trim).filter(|n| !n.is_empty()) {
                        graph.add_node(Node::measured(name)).map_err(|e| GraphError::Parse {
                            line: line_no,
                            reason: e.to_string(),
                        })?;
                    }
                }
                Section::Latents => {
                    for name in line.split(';').map(str::trim).filter(|n| !n.is_empty()) {
                        if !graph.contains_node(name) {
                            graph.add_node(Node::latent(name)).map_err(|e| GraphError::Parse {
                                line: line_no,
                                reason: e.to_string(),
                            })?;
                        } else {
                            graph.set_node_kind(name, NodeKind::Latent)?;
                        }
                    }
                }
                Section::Edges => {
                    let edge = parse_edge_line(line, line_no)?;
                    for name in [&edge.node1, &edge.node2] {
                        if !graph.contains_node(name) {
                            graph.add_variable(name)?;
                        }
                    }
                    graph.add_edge(edge).map_err(|e| GraphError::Parse {
                        line: line_no,
                        reason: e.to_string(),
                    })?;
                }
            }
        }

        Ok(graph)
    }
}
