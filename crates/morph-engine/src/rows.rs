//! Row access through resolved table handles.
//!
//! Row payloads arrive as JSON objects keyed by field name. Each value is
//! coerced to its column's type before it reaches storage; rows come back
//! as JSON objects whose keys are exactly the table's current fields.

use std::sync::Arc;
use std::time::Duration;

use morph_common::{FieldType, RowId, TableId, Value, MAX_STRING_LENGTH};
use morph_storage::{StorageEngine, StorageError};
use morph_txn::TableLockManager;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::resolver::{ColumnHandle, TableHandle, TableResolver};

/// A row as returned to clients.
pub type RowObject = Map<String, JsonValue>;

/// Validated row insert and listing.
#[derive(Debug)]
pub struct RowAccess {
    storage: Arc<StorageEngine>,
    resolver: Arc<TableResolver>,
    locks: Arc<TableLockManager>,
    lock_timeout: Duration,
}

impl RowAccess {
    /// Creates the row access layer.
    pub fn new(
        storage: Arc<StorageEngine>,
        resolver: Arc<TableResolver>,
        locks: Arc<TableLockManager>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            resolver,
            locks,
            lock_timeout,
        }
    }

    /// Inserts one row. Omitted fields are stored as NULL.
    ///
    /// The row becomes visible to `list_rows` only after its redo record
    /// is written.
    pub fn insert(&self, table_id: TableId, fields: &RowObject) -> EngineResult<RowId> {
        self.ensure_exists(table_id)?;
        let _guard = self.locks.lock_shared(table_id, self.lock_timeout)?;
        let handle = self.resolver.resolve(table_id)?;

        let values = prepare_row(&handle, fields)?;

        // The shared lock keeps the columns fixed until the row is placed.
        let row_id = self
            .storage
            .insert_row(&handle.physical_name, &values)
            .map_err(storage_value_error)?;

        debug!(table = %table_id, row = row_id.as_u64(), "row inserted");
        Ok(row_id)
    }

    /// Lists every row of a table in insertion order.
    pub fn list_rows(&self, table_id: TableId) -> EngineResult<Vec<RowObject>> {
        self.ensure_exists(table_id)?;
        let _guard = self.locks.lock_shared(table_id, self.lock_timeout)?;
        let handle = self.resolver.resolve(table_id)?;

        let snapshot = self.storage.scan(&handle.physical_name)?;
        let rows = snapshot
            .rows
            .iter()
            .map(|row| {
                handle
                    .columns
                    .iter()
                    .map(|c| {
                        let value = snapshot
                            .value(row, &c.name)
                            .map_or(JsonValue::Null, Value::to_json);
                        (c.name.clone(), value)
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    fn ensure_exists(&self, table_id: TableId) -> EngineResult<()> {
        if self.resolver.exists(table_id)? {
            Ok(())
        } else {
            Err(EngineError::not_found(table_id.to_string()))
        }
    }
}

/// Checks a payload against a handle and coerces every value.
///
/// Unknown fields are reported before type errors.
pub fn prepare_row(handle: &TableHandle, fields: &RowObject) -> EngineResult<Vec<(String, Value)>> {
    if let Some(unknown) = fields.keys().find(|k| handle.column(k).is_none()) {
        return Err(EngineError::UnknownField {
            field: unknown.clone(),
        });
    }

    fields
        .iter()
        .map(|(name, raw)| {
            let column = handle
                .column(name)
                .ok_or_else(|| EngineError::UnknownField {
                    field: name.clone(),
                })?;
            Ok((name.clone(), coerce(column, raw)?))
        })
        .collect()
}

/// Coerces a JSON value to the column's type.
pub fn coerce(column: &ColumnHandle, raw: &JsonValue) -> EngineResult<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let coerced = match column.field_type {
        FieldType::Boolean => coerce_bool(raw),
        FieldType::Number => coerce_int(raw),
        FieldType::String => coerce_string(raw),
    };
    coerced.map_err(|message| EngineError::TypeMismatch {
        field: column.name.clone(),
        message,
    })
}

fn coerce_bool(raw: &JsonValue) -> Result<Value, String> {
    let parsed = match raw {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        JsonValue::String(s) => match s.as_str() {
            "t" | "True" | "1" => Some(true),
            "f" | "False" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Value::Boolean)
        .ok_or_else(|| format!("'{}' value must be either True, False, or None.", display(raw)))
}

/// Floats truncate toward zero and booleans count as 0/1.
fn coerce_int(raw: &JsonValue) -> Result<Value, String> {
    let parsed = match raw {
        JsonValue::Bool(b) => Some(i64::from(*b)),
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .map(f64::trunc)
                .filter(|f| f.abs() <= f64::from(i32::MAX) + 1.0)
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|i| i32::try_from(i).ok())
        .map(Value::Int)
        .ok_or_else(|| format!("'{}' value must be an integer.", display(raw)))
}

fn coerce_string(raw: &JsonValue) -> Result<Value, String> {
    let text = match raw {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        _ => return Err("Not a valid string.".to_string()),
    };
    let length = text.chars().count();
    if length > MAX_STRING_LENGTH {
        return Err(format!(
            "Ensure this value has at most {} characters (it has {}).",
            MAX_STRING_LENGTH, length
        ));
    }
    Ok(Value::String(text))
}

fn display(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps a storage-level value rejection onto the client-facing type error.
fn storage_value_error(err: StorageError) -> EngineError {
    match err {
        StorageError::TypeMismatch { ref column, .. }
        | StorageError::ValueTooLong { ref column, .. }
        | StorageError::NullViolation { ref column } => EngineError::TypeMismatch {
            field: column.clone(),
            message: err.to_string(),
        },
        other => EngineError::Storage(other),
    }
}
