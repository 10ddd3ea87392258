//! pagcache-transform — DAG → MAG → PAG conversion behind the `Transform` trait
//!
//! The cache only ever sees [`Transform`]; [`DagToPag`] is the reference
//! implementation used by the CLI and tests.

pub mod dag;
pub mod error;
pub mod mag;
pub mod orient;
pub mod transform;


pub use dag::{check_dag, is_dag, topological_order};
pub use error::TransformError;
pub use mag::dag_to_mag;
pub use orient::mag_to_pag;
pub use transform::{DagToPag, FnTransform, Transform};
