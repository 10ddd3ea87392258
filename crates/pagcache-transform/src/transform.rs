//! The `Transform` seam between the cache and the graph algorithms.

use std::sync::Arc;

use pagcache_graph::Graph;
use tracing::debug;

use crate::error::TransformError;
use crate::mag::dag_to_mag;
use crate::orient::mag_to_pag;

/// A deterministic, side-effect-free `source -> derived` graph function.
///
/// Implementations must return structurally equal output for structurally
/// equal input; the cache relies on this to detect drift.
pub trait Transform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError>;
}

impl<T: Transform + ?Sized> Transform for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        (**self).transform(source)
    }
}

impl<T: Transform + ?Sized> Transform for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        (**self).transform(source)
    }
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        (**self).transform(source)
    }
}

/// DAG → MAG → PAG.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagToPag;

impl Transform for DagToPag {
    fn name(&self) -> &str {
        "dag-to-pag"
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        let mag = dag_to_mag(source)?;
        let pag = mag_to_pag(&mag);
        debug!(source = %source.id(), edges = pag.edge_count(), "DAG converted to PAG");
        Ok(pag)
    }
}

/// Adapts a closure into a [`Transform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&Graph) -> Result<Graph, TransformError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnTransform {
            name: name.into(),
            f,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Graph) -> Result<Graph, TransformError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, source: &Graph) -> Result<Graph, TransformError> {
        (self.f)(source)
    }
}
