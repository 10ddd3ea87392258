//! Error types for cache lookups and configuration.

use std::path::PathBuf;

use pagcache_transform::TransformError;

/// Why `get_derived` failed. Nothing is cached or modified on any of these.
///
/// `Clone` so one failed attempt can be delivered to every caller that
/// joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The source violates the transform's precondition (e.g. has a cycle).
    #[error("source precondition violated: {0}")]
    Precondition(TransformError),

    /// The transform failed on a legal source.
    #[error("{0}")]
    Transform(TransformError),

    /// The surrounding search asked us to stop before any work was done.
    #[error("lookup cancelled")]
    Cancelled,
}

impl From<TransformError> for CacheError {
    fn from(err: TransformError) -> Self {
        if err.is_precondition() {
            CacheError::Precondition(err)
        } else {
            CacheError::Transform(err)
        }
    }
}

/// Errors loading a [`crate::CacheConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
