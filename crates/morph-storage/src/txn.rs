//! Storage transactions.
//!
//! A `Transaction` applies every operation to the live tables immediately
//! and records how to reverse it. Commit writes the collected redo record
//! to the log; rollback (explicit, or implicit on drop) replays the undo
//! log backwards so that both schema and rows return to their prior state.

use std::sync::Arc;

use bytes::Bytes;
use morph_common::{RowId, TxnId, Value};
use tracing::{debug, error, warn};

use crate::engine::StorageEngine;
use crate::error::{StorageError, StorageResult};
use crate::redo::{RedoOp, RedoRecord};
use crate::schema::{ColumnDef, TableSchema};
use crate::table::{DroppedColumn, TableStore};

/// Reverse action for one applied operation.
#[derive(Debug)]
enum UndoOp {
    CreateTable { table: String },
    AddColumn { table: Arc<TableStore>, column: String },
    DropColumn { table: Arc<TableStore>, dropped: DroppedColumn },
    Insert { table: Arc<TableStore>, row_id: RowId },
    Delete { table: Arc<TableStore>, row_id: RowId, bytes: Bytes },
}

/// A unit of work covering DDL and DML on any number of tables.
///
/// Dropping an uncommitted transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'a> {
    engine: &'a StorageEngine,
    txn_id: TxnId,
    undo: Vec<UndoOp>,
    redo: Vec<RedoOp>,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(engine: &'a StorageEngine, txn_id: TxnId) -> Self {
        Self {
            engine,
            txn_id,
            undo: Vec::new(),
            redo: Vec::new(),
            finished: false,
        }
    }

    /// Returns the transaction id.
    pub fn id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the number of operations applied so far.
    pub fn op_count(&self) -> usize {
        self.redo.len()
    }

    // =========================================================================
    // DDL Operations
    // =========================================================================

    /// Creates a table.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnDef>) -> StorageResult<()> {
        let max = self.engine.config().max_columns_per_table;
        if columns.len() > max {
            return Err(StorageError::TooManyColumns {
                table: name.to_string(),
                max,
            });
        }

        let schema = TableSchema::new(name, columns.clone())?;
        self.engine.install_table(name, schema)?;

        self.undo.push(UndoOp::CreateTable {
            table: name.to_string(),
        });
        self.redo.push(RedoOp::CreateTable {
            table: name.to_string(),
            columns,
        });
        Ok(())
    }

    /// Appends a nullable column to an existing table.
    pub fn add_column(&mut self, table: &str, column: ColumnDef) -> StorageResult<()> {
        let store = self.engine.table(table)?;
        store.add_column(column.clone(), self.engine.config().max_columns_per_table)?;

        self.undo.push(UndoOp::AddColumn {
            table: store,
            column: column.name.clone(),
        });
        self.redo.push(RedoOp::AddColumn {
            table: table.to_string(),
            column,
        });
        Ok(())
    }

    /// Drops a column and its data.
    pub fn drop_column(&mut self, table: &str, column: &str) -> StorageResult<()> {
        let store = self.engine.table(table)?;
        let dropped = store.drop_column(column)?;

        self.undo.push(UndoOp::DropColumn {
            table: store,
            dropped,
        });
        self.redo.push(RedoOp::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // DML Operations
    // =========================================================================

    /// Inserts a row given as named values and returns its id.
    pub fn insert(&mut self, table: &str, values: &[(String, Value)]) -> StorageResult<RowId> {
        let store = self.engine.table(table)?;
        let row_id = store.insert(values)?;

        self.undo.push(UndoOp::Insert {
            table: store,
            row_id,
        });
        self.redo.push(RedoOp::Insert {
            table: table.to_string(),
            row_id,
            values: values.to_vec(),
        });
        Ok(row_id)
    }

    /// Deletes a row. Returns false if it did not exist.
    pub fn delete(&mut self, table: &str, row_id: RowId) -> StorageResult<bool> {
        let store = self.engine.table(table)?;
        let Some(bytes) = store.delete(row_id) else {
            return Ok(false);
        };

        self.undo.push(UndoOp::Delete {
            table: store,
            row_id,
            bytes,
        });
        self.redo.push(RedoOp::Delete {
            table: table.to_string(),
            row_id,
        });
        Ok(true)
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Makes the transaction's effects durable.
    ///
    /// If the redo log cannot be written the transaction is rolled back
    /// and the error returned.
    pub fn commit(mut self) -> StorageResult<()> {
        if !self.redo.is_empty() {
            let record = RedoRecord {
                txn_id: self.txn_id,
                ops: std::mem::take(&mut self.redo),
            };
            if let Err(e) = self.engine.log_commit(&record) {
                error!(txn = self.txn_id.as_u64(), error = %e, "redo append failed, rolling back");
                self.undo_all();
                self.finished = true;
                self.engine.record_rollback();
                return Err(e);
            }
        }

        debug!(txn = self.txn_id.as_u64(), ops = self.undo.len(), "transaction committed");
        self.undo.clear();
        self.finished = true;
        self.engine.record_commit();
        Ok(())
    }

    /// Reverts every operation applied by this transaction.
    pub fn rollback(mut self) {
        debug!(txn = self.txn_id.as_u64(), ops = self.undo.len(), "transaction rolled back");
        self.undo_all();
        self.finished = true;
        self.engine.record_rollback();
    }

    fn undo_all(&mut self) {
        while let Some(op) = self.undo.pop() {
            match op {
                UndoOp::CreateTable { table } => self.engine.remove_table(&table),
                UndoOp::AddColumn { table, column } => {
                    if let Err(e) = table.drop_column(&column) {
                        error!(table = table.name(), column = %column, error = %e, "failed to undo add column");
                    }
                }
                UndoOp::DropColumn { table, dropped } => table.restore_column(dropped),
                UndoOp::Insert { table, row_id } => {
                    table.delete(row_id);
                }
                UndoOp::Delete {
                    table,
                    row_id,
                    bytes,
                } => table.restore_row(row_id, bytes),
            }
        }
        self.redo.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if !self.undo.is_empty() {
                warn!(
                    txn = self.txn_id.as_u64(),
                    ops = self.undo.len(),
                    "transaction dropped without commit, rolling back"
                );
            }
            self.undo_all();
            self.finished = true;
            self.engine.record_rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use morph_common::config::StorageConfig;

    use super::*;
    use crate::schema::StorageType;

    fn engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::in_memory().with_max_columns(3)).unwrap()
    }

    fn int(name: &str) -> ColumnDef {
        ColumnDef::nullable(name, StorageType::Integer)
    }

    fn named(name: &str, v: i32) -> Vec<(String, Value)> {
        vec![(name.to_string(), Value::Int(v))]
    }

    #[test]
    fn test_commit_keeps_changes() {
        let engine = engine();
        let mut txn = engine.begin();
        txn.create_table("t", vec![int("a")]).unwrap();
        txn.insert("t", &named("a", 1)).unwrap();
        txn.commit().unwrap();

        assert!(engine.table_exists("t"));
        assert_eq!(engine.scan("t").unwrap().len(), 1);
        assert_eq!(engine.stats().committed, 1);
    }

    #[test]
    fn test_rollback_reverts_ddl_and_dml() {
        let engine = engine();
        let mut setup = engine.begin();
        setup.create_table("t", vec![int("a"), int("b")]).unwrap();
        setup.insert("t", &named("b", 9)).unwrap();
        setup.commit().unwrap();

        let mut txn = engine.begin();
        txn.drop_column("t", "b").unwrap();
        txn.add_column("t", int("c")).unwrap();
        txn.insert("t", &named("c", 3)).unwrap();
        txn.create_table("u", vec![int("x")]).unwrap();
        txn.rollback();

        assert!(!engine.table_exists("u"));
        let snapshot = engine.scan("t").unwrap();
        assert_eq!(
            snapshot.schema.columns().iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.rows[0].values, vec![Value::Null, Value::Int(9)]);
    }

    #[test]
    fn test_drop_rolls_back() {
        let engine = engine();
        {
            let mut txn = engine.begin();
            txn.create_table("t", vec![int("a")]).unwrap();
        }
        assert!(!engine.table_exists("t"));
        assert_eq!(engine.stats().rolled_back, 1);
    }

    #[test]
    fn test_failed_add_leaves_earlier_ops_undoable() {
        let engine = engine();
        let mut setup = engine.begin();
        setup.create_table("t", vec![int("a"), int("b")]).unwrap();
        setup.commit().unwrap();

        let mut txn = engine.begin();
        txn.add_column("t", int("c")).unwrap();
        let err = txn.add_column("t", int("d")).unwrap_err();
        assert!(matches!(err, StorageError::TooManyColumns { max: 3, .. }));
        drop(txn);

        assert_eq!(engine.schema("t").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_and_undo() {
        let engine = engine();
        let mut setup = engine.begin();
        setup.create_table("t", vec![int("a")]).unwrap();
        let id = setup.insert("t", &named("a", 4)).unwrap();
        setup.commit().unwrap();

        let mut txn = engine.begin();
        assert!(txn.delete("t", id).unwrap());
        assert!(!txn.delete("t", RowId::new(99)).unwrap());
        txn.rollback();

        assert_eq!(
            engine.table("t").unwrap().get(id).unwrap(),
            Some(vec![Value::Int(4)])
        );
    }

    #[test]
    fn test_create_table_too_wide() {
        let engine = engine();
        let mut txn = engine.begin();
        let result = txn.create_table("t", vec![int("a"), int("b"), int("c"), int("d")]);
        assert!(matches!(result, Err(StorageError::TooManyColumns { .. })));
        assert_eq!(txn.op_count(), 0);
    }
}
