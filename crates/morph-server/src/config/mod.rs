//! Server configuration.
//!
//! A single TOML file configures the storage engine, the schema engine and
//! logging. Every key is optional:
//!
//! ```toml
//! log_level = "info"
//!
//! [storage]
//! data_dir = "/var/lib/morphdb"
//! sync_on_commit = true
//! max_columns_per_table = 1600
//!
//! [engine]
//! default_group = "api"
//! lock_timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use morph_common::config::{EngineConfig, StorageConfig};
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Storage engine settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Schema engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(anyhow!(
                "log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }
        self.storage
            .validate()
            .map_err(|reason| anyhow!("[storage] {reason}"))?;
        self.engine
            .validate()
            .map_err(|reason| anyhow!("[engine] {reason}"))?;
        Ok(())
    }

    /// Returns true if no data directory is configured.
    pub fn is_memory(&self) -> bool {
        self.storage.data_dir.is_none()
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.data_dir = Some(dir.into());
        self
    }

    /// Drops the data directory so nothing is persisted.
    pub fn memory(mut self) -> Self {
        self.config.storage.data_dir = None;
        self
    }

    /// Sets whether commits fsync the redo log.
    pub fn sync_on_commit(mut self, enabled: bool) -> Self {
        self.config.storage.sync_on_commit = enabled;
        self
    }

    /// Sets the per-table column limit.
    pub fn max_columns_per_table(mut self, max: usize) -> Self {
        self.config.storage.max_columns_per_table = max;
        self
    }

    /// Sets the group new tables are registered under.
    pub fn default_group(mut self, group: impl Into<String>) -> Self {
        self.config.engine.default_group = group.into();
        self
    }

    /// Sets the table lock timeout.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.engine = self.config.engine.with_lock_timeout(timeout);
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.is_memory());
        assert_eq!(config.engine.default_group, "api");
        assert_eq!(config.storage.max_columns_per_table, 1600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .data_dir("/data/morph")
            .sync_on_commit(false)
            .max_columns_per_table(8)
            .default_group("crm")
            .lock_timeout(Duration::from_millis(50))
            .log_level("debug")
            .build();

        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/data/morph")));
        assert!(!config.storage.sync_on_commit);
        assert_eq!(config.storage.max_columns_per_table, 8);
        assert_eq!(config.engine.default_group, "crm");
        assert_eq!(config.engine.lock_timeout_ms, 50);
        assert_eq!(config.log_level, "debug");
        assert!(!config.is_memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = ServerConfig::builder().log_level("loud").build();
        assert!(config.validate().is_err());

        let config = ServerConfig::builder().max_columns_per_table(0).build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().starts_with("[storage]"));

        let config = ServerConfig::builder().default_group("").build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().starts_with("[engine]"));
    }

    #[test]
    fn test_to_toml() {
        let config = ServerConfig::builder().data_dir("/data/morph").build();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("log_level"));
        assert!(toml.contains("[storage]"));
        assert!(toml.contains("[engine]"));
    }

    #[test]
    fn test_partial_file() {
        let config: ServerConfig = toml::from_str("[engine]\nlock_timeout_ms = 10\n").unwrap();
        assert_eq!(config.engine.lock_timeout_ms, 10);
        assert_eq!(config.engine.default_group, "api");
        assert_eq!(config.log_level, "info");
        assert!(config.is_memory());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("morph.toml");

        let config = ServerConfig::builder()
            .data_dir(temp_dir.path().join("data"))
            .log_level("warn")
            .build();
        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ServerConfig::from_file(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
