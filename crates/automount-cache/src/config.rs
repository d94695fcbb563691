//! Cache configuration.
//!
//! The defaults reproduce the classic automounter layout: 77 hash buckets,
//! paths bounded by `PATH_MAX`, and read-only ghost directories.
//!
//! # Example configuration
//!
//! ```toml
//! table_size = 101
//! key_max_len = 4096
//! ghost_dir_mode = 0o555
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Default number of hash buckets (and reverse-index slots).
pub const DEFAULT_TABLE_SIZE: usize = 77;

/// Default upper bound on computed path length, in bytes.
pub const DEFAULT_KEY_MAX_LEN: usize = 4096;

/// Default permission bits for ghost directories (r-xr-xr-x).
pub const DEFAULT_GHOST_DIR_MODE: u32 = 0o555;

/// Tunables for a [`MapCache`](crate::MapCache).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of hash buckets. The reverse index has the same number of slots.
    pub table_size: usize,

    /// Maximum length of a full path computed from a root and a key,
    /// counting one byte for the terminator.
    pub key_max_len: usize,

    /// Mode used when creating ghost directories.
    pub ghost_dir_mode: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
            key_max_len: DEFAULT_KEY_MAX_LEN,
            ghost_dir_mode: DEFAULT_GHOST_DIR_MODE,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with a custom bucket count.
    pub fn with_table_size(table_size: usize) -> Self {
        Self {
            table_size,
            ..Default::default()
        }
    }

    /// Parses a configuration from a TOML document.
    ///
    /// Missing fields take their default values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CacheConfig =
            toml::from_str(content).context("Failed to parse cache configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Checks that the configuration can back a table.
    pub fn validate(&self) -> std::result::Result<(), CacheError> {
        if self.table_size == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "table_size must be at least 1".to_string(),
            });
        }
        if self.key_max_len < 2 {
            return Err(CacheError::InvalidConfig {
                reason: format!("key_max_len {} is too small", self.key_max_len),
            });
        }
        if self.ghost_dir_mode & !0o7777 != 0 {
            return Err(CacheError::InvalidConfig {
                reason: format!("ghost_dir_mode {:o} has non-permission bits", self.ghost_dir_mode),
            });
        }
        Ok(())
    }
}
