//! Cache configuration, loadable from TOML.
//!
//! ```toml
//! key_mode = "structure"
//! capacity = 512
//! shard_amount = 16
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What a cache entry is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// The source graph's identity. Structurally equal sources held as
    /// distinct instances get distinct entries.
    #[default]
    Instance,
    /// The source graph's structural fingerprint. Equal sources share one
    /// entry and therefore one derived handle.
    Structure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub key_mode: KeyMode,
    /// Maximum number of entries; least recently used idle entries are
    /// evicted beyond it. `None` means unbounded.
    pub capacity: Option<usize>,
    /// Shard count for the slot table. Power of two, greater than one.
    pub shard_amount: Option<usize>,
}

impl CacheConfig {
    pub fn with_key_mode(mut self, key_mode: KeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if let Some(n) = self.shard_amount {
            if n < 2 || !n.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "shard_amount must be a power of two greater than 1, got {n}"
                )));
            }
        }
        Ok(())
    }
}
