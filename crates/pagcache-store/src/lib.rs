//! pagcache-store — memoized derived graphs with identity-stable handles
//!
//! [`DerivedCache`] wraps a [`pagcache_transform::Transform`] and hands out
//! one [`SharedGraph`] per source. Callers that mutate the handle get it
//! repaired in place on their next lookup; a structurally changed source gets
//! a fresh handle.

pub mod cancel;
pub mod config;
pub mod entry;
pub mod error;
mod flight;
pub mod stats;
pub mod store;

#[cfg(test)]
pub mod tests;

pub use cancel::CancelFlag;
pub use config::{CacheConfig, KeyMode};
pub use entry::{CacheEntry, SharedGraph, read_graph, same_handle, write_graph};
pub use error::{CacheError, ConfigError};
pub use stats::CacheStats;
pub use store::{DerivedCache, PagCache};
