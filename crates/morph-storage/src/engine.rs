//! Storage engine for managing all tables.
//!
//! This module provides `StorageEngine`, the entry point for storage
//! operations. It owns the table map and the redo log, hands out
//! transactions, and rebuilds committed state from the log on open.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use morph_common::config::StorageConfig;
use morph_common::{RowId, TxnId, Value, REDO_LOG_FILE_NAME};
use parking_lot::RwLock;
use tracing::{error, info};

use crate::error::{StorageError, StorageResult};
use crate::redo::{RedoLog, RedoOp, RedoRecord};
use crate::schema::TableSchema;
use crate::table::{TableSnapshot, TableStore};
use crate::txn::Transaction;

/// Storage engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of tables, system tables included.
    pub tables: usize,
    /// Total rows across all tables.
    pub rows: usize,
    /// Transactions committed since open.
    pub committed: u64,
    /// Transactions rolled back since open.
    pub rolled_back: u64,
    /// Records replayed from the redo log at open.
    pub replayed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    committed: AtomicU64,
    rolled_back: AtomicU64,
    replayed: AtomicU64,
}

/// Storage engine that manages all tables.
///
/// Every change goes through a [`Transaction`]. When a data directory is
/// configured, committed transactions are appended to the redo log and
/// replayed on the next open.
#[derive(Debug)]
pub struct StorageEngine {
    /// Engine configuration.
    config: StorageConfig,
    /// Table stores by name.
    tables: RwLock<HashMap<String, Arc<TableStore>>>,
    /// Redo log, if persistent.
    redo: Option<RedoLog>,
    /// Next transaction id.
    next_txn_id: AtomicU64,
    /// Commit/rollback counters.
    counters: Counters,
}

impl StorageEngine {
    /// Opens a storage engine, replaying the redo log if persistent.
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|reason| StorageError::InvalidConfig { reason })?;

        let mut engine = Self {
            config,
            tables: RwLock::new(HashMap::new()),
            redo: None,
            next_txn_id: AtomicU64::new(TxnId::FIRST.as_u64()),
            counters: Counters::default(),
        };

        if let Some(dir) = engine.config.data_dir.clone() {
            let (log, records) = RedoLog::open(&dir, REDO_LOG_FILE_NAME, engine.config.sync_on_commit)?;
            engine.replay(&records)?;
            engine.redo = Some(log);
            info!(
                data_dir = %dir.display(),
                records = records.len(),
                tables = engine.tables.read().len(),
                "storage engine opened"
            );
        }

        Ok(engine)
    }

    /// Opens a purely in-memory engine.
    pub fn open_memory() -> Self {
        Self {
            config: StorageConfig::in_memory(),
            tables: RwLock::new(HashMap::new()),
            redo: None,
            next_txn_id: AtomicU64::new(TxnId::FIRST.as_u64()),
            counters: Counters::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns true if committed state survives a restart.
    pub fn is_persistent(&self) -> bool {
        self.redo.is_some()
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, self.allocate_txn_id())
    }

    /// Inserts one row as its own transaction.
    ///
    /// Unlike [`Transaction::insert`], the redo record is written before the
    /// row is placed, so scans never see a row whose commit fails. The
    /// caller must keep the table's columns stable until this returns.
    pub fn insert_row(&self, table: &str, values: &[(String, Value)]) -> StorageResult<RowId> {
        let store = self.table(table)?;
        let (row_id, bytes) = store.prepare_insert(values)?;

        let txn_id = self.allocate_txn_id();
        let record = RedoRecord {
            txn_id,
            ops: vec![RedoOp::Insert {
                table: table.to_string(),
                row_id,
                values: values.to_vec(),
            }],
        };
        if let Err(e) = self.log_commit(&record) {
            error!(txn = txn_id.as_u64(), table, error = %e, "redo append failed, row discarded");
            self.record_rollback();
            return Err(e);
        }

        store.restore_row(row_id, bytes);
        self.record_commit();
        Ok(row_id)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Checks if a table exists.
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Gets a table store.
    pub fn table(&self, name: &str) -> StorageResult<Arc<TableStore>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::table_not_found(name))
    }

    /// Lists all table names in sorted order.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the current columns of a table.
    pub fn schema(&self, name: &str) -> StorageResult<TableSchema> {
        Ok(self.table(name)?.schema())
    }

    /// Scans all rows of a table.
    pub fn scan(&self, name: &str) -> StorageResult<TableSnapshot> {
        self.table(name)?.scan()
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StorageStats {
        let tables = self.tables.read();
        StorageStats {
            tables: tables.len(),
            rows: tables.values().map(|t| t.row_count()).sum(),
            committed: self.counters.committed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
            replayed: self.counters.replayed.load(Ordering::Relaxed),
        }
    }

    // =========================================================================
    // Transaction Support
    // =========================================================================

    pub(crate) fn install_table(&self, name: &str, schema: TableSchema) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StorageError::TableExists {
                table: name.to_string(),
            });
        }
        tables.insert(name.to_string(), Arc::new(TableStore::new(name, schema)));
        Ok(())
    }

    pub(crate) fn remove_table(&self, name: &str) {
        self.tables.write().remove(name);
    }

    fn allocate_txn_id(&self) -> TxnId {
        TxnId::new(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn log_commit(&self, record: &RedoRecord) -> StorageResult<()> {
        match &self.redo {
            Some(log) => log.append(record),
            None => Ok(()),
        }
    }

    pub(crate) fn record_commit(&self) {
        self.counters.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    fn replay(&self, records: &[RedoRecord]) -> StorageResult<()> {
        let mut max_txn = 0;
        for (index, record) in records.iter().enumerate() {
            for op in &record.ops {
                self.apply(op).map_err(|e| StorageError::RedoCorrupted {
                    record: index,
                    reason: e.to_string(),
                })?;
            }
            max_txn = max_txn.max(record.txn_id.as_u64());
        }

        self.next_txn_id.store(max_txn + 1, Ordering::Relaxed);
        self.counters
            .replayed
            .store(records.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn apply(&self, op: &RedoOp) -> StorageResult<()> {
        match op {
            RedoOp::CreateTable { table, columns } => {
                let schema = TableSchema::new(table, columns.clone())?;
                self.install_table(table, schema)
            }
            // The column limit was enforced when the record was written.
            RedoOp::AddColumn { table, column } => {
                self.table(table)?.add_column(column.clone(), usize::MAX)
            }
            RedoOp::DropColumn { table, column } => {
                self.table(table)?.drop_column(column).map(|_| ())
            }
            RedoOp::Insert {
                table,
                row_id,
                values,
            } => self.table(table)?.insert_with_id(*row_id, values),
            RedoOp::Delete { table, row_id } => {
                self.table(table)?.delete(*row_id);
                Ok(())
            }
        }
    }
}
