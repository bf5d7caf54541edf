//! Per-table physical storage.
//!
//! `TableStore` owns one table's column descriptor and its encoded rows,
//! keyed by `RowId` so that a scan returns rows in insertion order.

use std::collections::BTreeMap;

use bytes::Bytes;
use morph_common::{RowId, Value};
use parking_lot::RwLock;

use crate::encoder::{RowDecoder, RowEncoder};
use crate::error::{StorageError, StorageResult};
use crate::schema::{ColumnDef, TableSchema};

/// A decoded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Storage-assigned row id.
    pub id: RowId,
    /// Values in physical column order.
    pub values: Vec<Value>,
}

/// Consistent view of a table: its columns and all rows decoded against them.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    /// Columns at the time of the scan.
    pub schema: TableSchema,
    /// Rows in storage order.
    pub rows: Vec<Row>,
}

impl TableSnapshot {
    /// Returns the value of `column` in `row`, if the column exists.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Value> {
        self.schema.position(column).and_then(|i| row.values.get(i))
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// State removed by a column drop, kept so the drop can be undone.
#[derive(Debug)]
pub(crate) struct DroppedColumn {
    pub position: usize,
    pub column: ColumnDef,
    pub rows: BTreeMap<RowId, Bytes>,
}

#[derive(Debug)]
struct TableData {
    schema: TableSchema,
    rows: BTreeMap<RowId, Bytes>,
    next_row_id: RowId,
}

/// Storage for a single physical table.
#[derive(Debug)]
pub struct TableStore {
    /// Physical table name.
    name: String,
    /// Columns and rows, latched together so scans are consistent.
    data: RwLock<TableData>,
}

impl TableStore {
    /// Creates an empty table.
    pub(crate) fn new(name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(TableData {
                schema,
                rows: BTreeMap::new(),
                next_row_id: RowId::FIRST,
            }),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the current columns.
    pub fn schema(&self) -> TableSchema {
        self.data.read().schema.clone()
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.data.read().rows.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.data.read().rows.is_empty()
    }

    // =========================================================================
    // Row Operations
    // =========================================================================

    /// Inserts a row given as named values; omitted columns are NULL.
    pub(crate) fn insert(&self, values: &[(String, Value)]) -> StorageResult<RowId> {
        let mut data = self.data.write();
        let encoded = Self::encode_named(&self.name, &data.schema, values)?;

        let row_id = data.next_row_id;
        data.next_row_id = row_id.next();
        data.rows.insert(row_id, encoded);
        Ok(row_id)
    }

    /// Encodes a row and reserves its id without making it visible.
    ///
    /// The row appears in scans only once passed to `restore_row`. A
    /// reserved id that is never published is skipped.
    pub(crate) fn prepare_insert(&self, values: &[(String, Value)]) -> StorageResult<(RowId, Bytes)> {
        let mut data = self.data.write();
        let encoded = Self::encode_named(&self.name, &data.schema, values)?;

        let row_id = data.next_row_id;
        data.next_row_id = row_id.next();
        Ok((row_id, encoded))
    }

    /// Writes a row at a fixed row id (redo replay).
    pub(crate) fn insert_with_id(
        &self,
        row_id: RowId,
        values: &[(String, Value)],
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let encoded = Self::encode_named(&self.name, &data.schema, values)?;
        Self::place(&mut *data, row_id, encoded);
        Ok(())
    }

    /// Places encoded row bytes (undo of a delete, or a prepared insert).
    pub(crate) fn restore_row(&self, row_id: RowId, bytes: Bytes) {
        let mut data = self.data.write();
        Self::place(&mut *data, row_id, bytes);
    }

    /// Removes a row, returning its encoded bytes.
    pub(crate) fn delete(&self, row_id: RowId) -> Option<Bytes> {
        self.data.write().rows.remove(&row_id)
    }

    /// Reads a single row.
    pub fn get(&self, row_id: RowId) -> StorageResult<Option<Vec<Value>>> {
        let data = self.data.read();
        let decoder = RowDecoder::new(&data.schema);
        data.rows
            .get(&row_id)
            .map(|bytes| decoder.decode(bytes))
            .transpose()
    }

    /// Decodes every row against the current columns.
    pub fn scan(&self) -> StorageResult<TableSnapshot> {
        let data = self.data.read();
        let decoder = RowDecoder::new(&data.schema);
        let rows = data
            .rows
            .iter()
            .map(|(id, bytes)| {
                decoder.decode(bytes).map(|values| Row { id: *id, values })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(TableSnapshot {
            schema: data.schema.clone(),
            rows,
        })
    }

    // =========================================================================
    // Column Operations
    // =========================================================================

    /// Appends a column. Existing rows read NULL for it.
    pub(crate) fn add_column(&self, column: ColumnDef, max_columns: usize) -> StorageResult<()> {
        let mut data = self.data.write();
        if data.schema.len() >= max_columns {
            return Err(StorageError::TooManyColumns {
                table: self.name.clone(),
                max: max_columns,
            });
        }
        data.schema.push(&self.name, column)
    }

    /// Drops a column and rewrites every row without it.
    pub(crate) fn drop_column(&self, name: &str) -> StorageResult<DroppedColumn> {
        let mut data = self.data.write();
        let old_decoder = RowDecoder::new(&data.schema);
        let position = data
            .schema
            .position(name)
            .ok_or_else(|| StorageError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })?;

        let encoder = RowEncoder::new();
        let mut rewritten = BTreeMap::new();
        for (id, bytes) in &data.rows {
            let mut values = old_decoder.decode(bytes)?;
            values.remove(position);
            rewritten.insert(*id, encoder.encode(&values));
        }

        let (position, column) = data
            .schema
            .remove(name)
            .ok_or_else(|| StorageError::encoding("column vanished during drop"))?;
        let rows = std::mem::replace(&mut data.rows, rewritten);

        Ok(DroppedColumn {
            position,
            column,
            rows,
        })
    }

    /// Reinstates a dropped column together with the rows as they were.
    pub(crate) fn restore_column(&self, dropped: DroppedColumn) {
        let mut data = self.data.write();
        data.schema.insert_at(dropped.position, dropped.column);
        data.rows = dropped.rows;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn encode_named(
        table: &str,
        schema: &TableSchema,
        values: &[(String, Value)],
    ) -> StorageResult<Bytes> {
        let mut row = vec![Value::Null; schema.len()];
        for (name, value) in values {
            let position = schema
                .position(name)
                .ok_or_else(|| StorageError::ColumnNotFound {
                    table: table.to_string(),
                    column: name.clone(),
                })?;
            schema.columns()[position].check(value)?;
            row[position] = value.clone();
        }

        // Omitted columns must accept NULL.
        for (column, value) in schema.columns().iter().zip(&row) {
            if value.is_null() {
                column.check(value)?;
            }
        }

        Ok(RowEncoder::new().encode(&row))
    }

    fn place(data: &mut TableData, row_id: RowId, bytes: Bytes) {
        data.rows.insert(row_id, bytes);
        if row_id >= data.next_row_id {
            data.next_row_id = row_id.next();
        }
    }
}
