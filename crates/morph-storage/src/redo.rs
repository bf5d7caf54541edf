//! Redo log for committed transactions.
//!
//! Each committed transaction is appended as one JSON line holding every
//! operation it performed. Rolled back transactions never reach the log.
//! On open the log is read back and replayed in commit order; a torn
//! trailing line (crash mid-append) is cut off, anything else unreadable
//! is reported as corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use morph_common::{RowId, TxnId, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::schema::ColumnDef;

/// A single logged storage operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RedoOp {
    /// A table was created with the given columns.
    CreateTable {
        /// Physical table name.
        table: String,
        /// Initial columns.
        columns: Vec<ColumnDef>,
    },
    /// A column was appended.
    AddColumn {
        /// Physical table name.
        table: String,
        /// New column.
        column: ColumnDef,
    },
    /// A column was dropped.
    DropColumn {
        /// Physical table name.
        table: String,
        /// Dropped column name.
        column: String,
    },
    /// A row was written.
    Insert {
        /// Physical table name.
        table: String,
        /// Assigned row id.
        row_id: RowId,
        /// Named values as written.
        values: Vec<(String, Value)>,
    },
    /// A row was removed.
    Delete {
        /// Physical table name.
        table: String,
        /// Removed row.
        row_id: RowId,
    },
}

/// All operations of one committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedoRecord {
    /// Committing transaction.
    pub txn_id: TxnId,
    /// Operations in execution order.
    pub ops: Vec<RedoOp>,
}

/// Append-only redo log file.
#[derive(Debug)]
pub struct RedoLog {
    path: PathBuf,
    file: Mutex<File>,
    sync_on_commit: bool,
    records_written: AtomicU64,
    #[cfg(test)]
    fail_appends: std::sync::atomic::AtomicBool,
}

impl RedoLog {
    /// Opens (or creates) the log in `dir`, returning it together with the
    /// records already present.
    pub fn open(
        dir: &Path,
        file_name: &str,
        sync_on_commit: bool,
    ) -> StorageResult<(Self, Vec<RedoRecord>)> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let path = dir.join(file_name);

        let records = if path.exists() {
            Self::read_records(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;

        debug!(path = %path.display(), records = records.len(), "opened redo log");

        Ok((
            Self {
                path,
                file: Mutex::new(file),
                sync_on_commit,
                records_written: AtomicU64::new(0),
                #[cfg(test)]
                fail_appends: std::sync::atomic::AtomicBool::new(false),
            },
            records,
        ))
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records appended since open.
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Makes every later append fail with an I/O error.
    #[cfg(test)]
    pub(crate) fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::Relaxed);
    }

    /// Appends one committed transaction.
    pub fn append(&self, record: &RedoRecord) -> StorageResult<()> {
        #[cfg(test)]
        if self.fail_appends.load(Ordering::Relaxed) {
            return Err(StorageError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::Other, "append disabled"),
            ));
        }

        let mut line = serde_json::to_vec(record)
            .map_err(|e| StorageError::encoding(format!("failed to serialize redo record: {}", e)))?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)
            .and_then(|()| file.flush())
            .map_err(|e| StorageError::io(&self.path, e))?;
        if self.sync_on_commit {
            file.sync_data()
                .map_err(|e| StorageError::io(&self.path, e))?;
        }

        self.records_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_records(path: &Path) -> StorageResult<Vec<RedoRecord>> {
        let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut good_len: u64 = 0;
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| StorageError::io(path, e))?;
            if read == 0 {
                break;
            }

            // Only the last line can lack its newline.
            if !line.ends_with('\n') {
                warn!(
                    path = %path.display(),
                    offset = good_len,
                    "discarding torn redo record at end of log"
                );
                Self::truncate(path, good_len)?;
                break;
            }

            let record = serde_json::from_str::<RedoRecord>(line.trim_end()).map_err(|e| {
                StorageError::RedoCorrupted {
                    record: records.len(),
                    reason: e.to_string(),
                }
            })?;
            records.push(record);
            good_len += read as u64;
        }

        Ok(records)
    }

    fn truncate(path: &Path, len: u64) -> StorageResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;
        file.set_len(len).map_err(|e| StorageError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StorageType;

    fn record(txn: u64) -> RedoRecord {
        RedoRecord {
            txn_id: TxnId::new(txn),
            ops: vec![
                RedoOp::CreateTable {
                    table: "t".to_string(),
                    columns: vec![ColumnDef::nullable("a", StorageType::Integer)],
                },
                RedoOp::Insert {
                    table: "t".to_string(),
                    row_id: RowId::new(1),
                    values: vec![("a".to_string(), Value::Int(7))],
                },
            ],
        }
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (log, existing) = RedoLog::open(dir.path(), "redo", false).unwrap();
            assert!(existing.is_empty());
            log.append(&record(1)).unwrap();
            log.append(&record(2)).unwrap();
            assert_eq!(log.records_written(), 2);
        }

        let (_log, records) = RedoLog::open(dir.path(), "redo", false).unwrap();
        assert_eq!(records, vec![record(1), record(2)]);
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (log, _) = RedoLog::open(dir.path(), "redo", false).unwrap();
            log.append(&record(1)).unwrap();
        }
        let path = dir.path().join("redo");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"txn_id\":2,\"ops\":[").unwrap();
        drop(file);

        let (log, records) = RedoLog::open(dir.path(), "redo", false).unwrap();
        assert_eq!(records, vec![record(1)]);

        log.append(&record(3)).unwrap();
        drop(log);
        let (_log, records) = RedoLog::open(dir.path(), "redo", false).unwrap();
        assert_eq!(records, vec![record(1), record(3)]);
    }

    #[test]
    fn test_corrupt_middle_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redo");
        let good = serde_json::to_string(&record(1)).unwrap();
        fs::write(&path, format!("garbage\n{}\n", good)).unwrap();

        let result = RedoLog::open(dir.path(), "redo", false);
        assert!(matches!(
            result,
            Err(StorageError::RedoCorrupted { record: 0, .. })
        ));
    }
}
