//! Error types for graph construction and parsing.

/// Errors raised by `Graph` mutators and the text parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node `{0}` already exists")]
    DuplicateNode(String),

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("self loop on `{0}` is not allowed")]
    SelfLoop(String),

    #[error("`{0}` and `{1}` are already adjacent")]
    AlreadyAdjacent(String, String),

    #[error("`{0}` and `{1}` are not adjacent")]
    NotAdjacent(String, String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}
