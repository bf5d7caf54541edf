//! Physical column descriptors.
//!
//! A `TableSchema` is the ordered list of typed columns a physical table
//! currently holds. It is the descriptor the row codec is built from.

use std::collections::HashMap;
use std::fmt;

use morph_common::Value;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Physical storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    /// Text bounded to `max_length` characters.
    Varchar {
        /// Maximum length in characters.
        max_length: usize,
    },
    /// 32-bit signed integer.
    Integer,
    /// Boolean.
    Boolean,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Varchar { max_length } => write!(f, "varchar({})", max_length),
            StorageType::Integer => write!(f, "integer"),
            StorageType::Boolean => write!(f, "boolean"),
        }
    }
}

/// A physical column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub storage_type: StorageType,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, storage_type: StorageType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            storage_type,
            nullable,
        }
    }

    /// Creates a new nullable column.
    pub fn nullable(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self::new(name, storage_type, true)
    }

    /// Checks that `value` can be stored in this column.
    pub fn check(&self, value: &Value) -> StorageResult<()> {
        match (self.storage_type, value) {
            (_, Value::Null) if self.nullable => Ok(()),
            (_, Value::Null) => Err(StorageError::NullViolation {
                column: self.name.clone(),
            }),
            (StorageType::Boolean, Value::Boolean(_)) | (StorageType::Integer, Value::Int(_)) => {
                Ok(())
            }
            (StorageType::Varchar { max_length }, Value::String(s)) => {
                let length = s.chars().count();
                if length > max_length {
                    Err(StorageError::ValueTooLong {
                        column: self.name.clone(),
                        max_length,
                        length,
                    })
                } else {
                    Ok(())
                }
            }
            (expected, other) => Err(StorageError::TypeMismatch {
                column: self.name.clone(),
                expected,
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}",
            self.name,
            self.storage_type,
            if self.nullable { "" } else { " NOT NULL" }
        )
    }
}

/// Ordered column list of a physical table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    index: HashMap<String, usize>,
}

impl TableSchema {
    /// Creates a schema from a list of columns.
    ///
    /// Fails if two columns share a name.
    pub fn new(table: &str, columns: Vec<ColumnDef>) -> StorageResult<Self> {
        let mut schema = Self::default();
        for column in columns {
            schema.push(table, column)?;
        }
        Ok(schema)
    }

    /// Returns the columns in physical order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Returns true if both schemas hold the same columns, ignoring order.
    pub fn same_columns(&self, other: &[ColumnDef]) -> bool {
        self.columns.len() == other.len()
            && other
                .iter()
                .all(|c| self.column(&c.name).is_some_and(|mine| mine == c))
    }

    /// Appends a column.
    pub(crate) fn push(&mut self, table: &str, column: ColumnDef) -> StorageResult<()> {
        if self.index.contains_key(&column.name) {
            return Err(StorageError::ColumnExists {
                table: table.to_string(),
                column: column.name,
            });
        }
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Inserts a column at `position`, shifting later columns right.
    pub(crate) fn insert_at(&mut self, position: usize, column: ColumnDef) {
        let position = position.min(self.columns.len());
        self.columns.insert(position, column);
        self.reindex();
    }

    /// Removes a column, returning its former position and definition.
    pub(crate) fn remove(&mut self, name: &str) -> Option<(usize, ColumnDef)> {
        let position = self.position(name)?;
        let column = self.columns.remove(position);
        self.reindex();
        Some((position, column))
    }

    fn reindex(&mut self) {
        self.index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varchar() -> StorageType {
        StorageType::Varchar { max_length: 5 }
    }

    #[test]
    fn test_column_check() {
        let col = ColumnDef::nullable("name", varchar());
        assert!(col.check(&Value::string("abc")).is_ok());
        assert!(col.check(&Value::Null).is_ok());
        assert!(matches!(
            col.check(&Value::string("abcdef")),
            Err(StorageError::ValueTooLong { length: 6, .. })
        ));
        assert!(matches!(
            col.check(&Value::Int(1)),
            Err(StorageError::TypeMismatch {
                found: "integer",
                ..
            })
        ));

        let flag = ColumnDef::new("flag", StorageType::Boolean, false);
        assert!(flag.check(&Value::Boolean(true)).is_ok());
        assert!(matches!(
            flag.check(&Value::Null),
            Err(StorageError::NullViolation { .. })
        ));
    }

    #[test]
    fn test_length_counts_characters() {
        let col = ColumnDef::nullable("name", varchar());
        assert!(col.check(&Value::string("ééééé")).is_ok());
    }

    #[test]
    fn test_schema_duplicate_column() {
        let result = TableSchema::new(
            "t",
            vec![
                ColumnDef::nullable("a", StorageType::Integer),
                ColumnDef::nullable("a", StorageType::Boolean),
            ],
        );
        assert!(matches!(result, Err(StorageError::ColumnExists { .. })));
    }

    #[test]
    fn test_schema_remove_and_insert() {
        let mut schema = TableSchema::new(
            "t",
            vec![
                ColumnDef::nullable("a", StorageType::Integer),
                ColumnDef::nullable("b", StorageType::Boolean),
                ColumnDef::nullable("c", varchar()),
            ],
        )
        .unwrap();

        let (pos, col) = schema.remove("b").unwrap();
        assert_eq!(pos, 1);
        assert_eq!(schema.position("c"), Some(1));
        assert!(schema.column("b").is_none());

        schema.insert_at(pos, col);
        assert_eq!(schema.position("b"), Some(1));
        assert_eq!(schema.position("c"), Some(2));
    }

    #[test]
    fn test_same_columns_ignores_order() {
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnDef::nullable("a", StorageType::Integer),
                ColumnDef::nullable("b", StorageType::Boolean),
            ],
        )
        .unwrap();

        assert!(schema.same_columns(&[
            ColumnDef::nullable("b", StorageType::Boolean),
            ColumnDef::nullable("a", StorageType::Integer),
        ]));
        assert!(!schema.same_columns(&[ColumnDef::nullable("a", StorageType::Integer)]));
        assert!(!schema.same_columns(&[
            ColumnDef::nullable("a", StorageType::Boolean),
            ColumnDef::nullable("b", StorageType::Boolean),
        ]));
    }
}
