//! Transform failures.

/// Why a transform could not produce a derived graph.
///
/// `Clone` so a single failed computation can be reported to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The source does not satisfy the transform's precondition.
    #[error("source is not a DAG: {reason}")]
    NotADag { reason: String },

    /// The transform itself failed on a legal source.
    #[error("transform failed: {reason}")]
    Failed { reason: String },
}

impl TransformError {
    pub fn failed(reason: impl Into<String>) -> Self {
        TransformError::Failed {
            reason: reason.into(),
        }
    }

    /// True for precondition violations on the source.
    pub fn is_precondition(&self) -> bool {
        matches!(self, TransformError::NotADag { .. })
    }
}
