//! Main database facade.
//!
//! The `Database` struct is the top-level entry point for MorphDB. It opens
//! storage (replaying the redo log when persistent), builds the schema
//! engine over it and reports combined statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use morph_common::SYSTEM_TABLE_PREFIX;
use morph_engine::SchemaEngine;
use morph_storage::{StorageEngine, StorageStats};
use tracing::info;

use super::error::{DatabaseError, DatabaseResult};
use crate::config::ServerConfig;

/// Database statistics.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    /// Client-defined tables.
    pub user_tables: usize,
    /// Storage engine counters, system tables included.
    pub storage: StorageStats,
    /// Table handles currently cached.
    pub cached_handles: usize,
    /// Table locks currently held.
    pub locks_held: u64,
    /// Lock acquisitions that timed out.
    pub lock_timeouts: u64,
    /// Uptime.
    pub uptime: Duration,
}

/// The main database.
#[derive(Debug)]
pub struct Database {
    config: ServerConfig,
    storage: Arc<StorageEngine>,
    engine: SchemaEngine,
    started_at: Instant,
}

impl Database {
    /// Opens a database with the given configuration.
    pub fn open(config: &ServerConfig) -> DatabaseResult<Self> {
        config
            .validate()
            .map_err(|e| DatabaseError::Config(e.to_string()))?;

        let storage = Arc::new(StorageEngine::open(config.storage.clone())?);
        let engine = SchemaEngine::open(Arc::clone(&storage), config.engine.clone())?;

        match &config.storage.data_dir {
            Some(dir) => info!(
                data_dir = %dir.display(),
                replayed = storage.stats().replayed,
                "database opened"
            ),
            None => info!("database opened in memory"),
        }

        Ok(Self {
            config: config.clone(),
            storage,
            engine,
            started_at: Instant::now(),
        })
    }

    /// Opens an in-memory database.
    pub fn open_memory() -> DatabaseResult<Self> {
        Self::open(&ServerConfig::default())
    }

    /// Returns the schema engine.
    pub fn engine(&self) -> &SchemaEngine {
        &self.engine
    }

    /// Returns the storage engine.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns database statistics.
    pub fn stats(&self) -> DatabaseStats {
        let user_tables = self
            .storage
            .list_tables()
            .iter()
            .filter(|name| !name.starts_with(SYSTEM_TABLE_PREFIX))
            .count();
        let locks = self.engine.locks().stats();

        DatabaseStats {
            user_tables,
            storage: self.storage.stats(),
            cached_handles: self.engine.resolver().cached_count(),
            locks_held: locks.held(),
            lock_timeouts: locks.timeouts.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Closes the database.
    pub fn close(self) {
        let stats = self.stats();
        info!(
            committed = stats.storage.committed,
            rolled_back = stats.storage.rolled_back,
            uptime_ms = u64::try_from(stats.uptime.as_millis()).unwrap_or(u64::MAX),
            "database closed"
        );
    }
}
