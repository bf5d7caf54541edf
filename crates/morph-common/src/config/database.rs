//! Database configuration structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_GROUP_MODULE, DEFAULT_GROUP_NAME, DEFAULT_LOCK_TIMEOUT_MS,
    DEFAULT_MAX_COLUMNS_PER_TABLE, MAX_NAME_LENGTH,
};

/// Storage engine configuration.
///
/// # Example
///
/// ```rust
/// use morph_common::config::StorageConfig;
///
/// let config = StorageConfig::in_memory();
/// assert!(config.data_dir.is_none());
/// assert_eq!(config.max_columns_per_table, 1600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the redo log (None for in-memory).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Whether to fsync the redo log on every commit.
    #[serde(default = "default_sync_on_commit")]
    pub sync_on_commit: bool,

    /// Maximum number of columns a physical table may carry.
    #[serde(default = "default_max_columns")]
    pub max_columns_per_table: usize,
}

fn default_sync_on_commit() -> bool {
    true
}

fn default_max_columns() -> usize {
    DEFAULT_MAX_COLUMNS_PER_TABLE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sync_on_commit: default_sync_on_commit(),
            max_columns_per_table: default_max_columns(),
        }
    }
}

impl StorageConfig {
    /// Creates an in-memory configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a configuration persisting to the given directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Default::default()
        }
    }

    /// Sets the per-table column limit.
    #[must_use]
    pub fn with_max_columns(mut self, max: usize) -> Self {
        self.max_columns_per_table = max;
        self
    }

    /// Returns true if committed state is persisted.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.data_dir.is_some()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_columns_per_table == 0 {
            return Err("max_columns_per_table must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Dynamic schema engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Group that new tables are registered under.
    #[serde(default = "default_group")]
    pub default_group: String,

    /// Module recorded for the default group at bootstrap.
    #[serde(default = "default_module")]
    pub default_module: String,

    /// How long to wait for a table lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_group() -> String {
    DEFAULT_GROUP_NAME.to_string()
}

fn default_module() -> String {
    DEFAULT_GROUP_MODULE.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_group: default_group(),
            default_module: default_module(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Returns the lock timeout as a `Duration`.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Sets the lock timeout.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        for (what, value) in [
            ("default_group", &self.default_group),
            ("default_module", &self.default_module),
        ] {
            if value.is_empty() {
                return Err(format!("{what} must not be empty"));
            }
            if value.chars().count() > MAX_NAME_LENGTH {
                return Err(format!("{what} must be at most {MAX_NAME_LENGTH} characters"));
            }
        }
        if self.lock_timeout_ms == 0 {
            return Err("lock_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults() {
        let config = StorageConfig::default();
        assert!(!config.is_persistent());
        assert!(config.sync_on_commit);
        assert_eq!(config.max_columns_per_table, DEFAULT_MAX_COLUMNS_PER_TABLE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_validate() {
        let config = StorageConfig::in_memory().with_max_columns(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_group, "api");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_validate() {
        let mut config = EngineConfig::default();
        config.default_group = String::new();
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_lock_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StorageConfig = toml::from_str("sync_on_commit = false").unwrap();
        assert!(!config.sync_on_commit);
        assert_eq!(config.max_columns_per_table, DEFAULT_MAX_COLUMNS_PER_TABLE);

        let config: EngineConfig = toml::from_str("lock_timeout_ms = 250").unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_group, "api");
    }
}
