//! Storage error types.

use std::io;
use std::path::PathBuf;

use morph_common::ErrorCode;
use thiserror::Error;

use crate::schema::StorageType;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the physical storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Table not found.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Physical table name.
        table: String,
    },

    /// Table already exists.
    #[error("table already exists: {table}")]
    TableExists {
        /// Physical table name.
        table: String,
    },

    /// Column not found.
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        /// Physical table name.
        table: String,
        /// Missing column.
        column: String,
    },

    /// Column already exists.
    #[error("column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Physical table name.
        table: String,
        /// Duplicate column.
        column: String,
    },

    /// Adding a column would exceed the per-table limit.
    #[error("table '{table}' cannot have more than {max} columns")]
    TooManyColumns {
        /// Physical table name.
        table: String,
        /// Configured column limit.
        max: usize,
    },

    /// Value does not match the column's storage type.
    #[error("column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Target column.
        column: String,
        /// Column storage type.
        expected: StorageType,
        /// Kind of the rejected value.
        found: &'static str,
    },

    /// Text value longer than the column allows.
    #[error("value for column '{column}' has {length} characters, maximum is {max_length}")]
    ValueTooLong {
        /// Target column.
        column: String,
        /// Column length limit in characters.
        max_length: usize,
        /// Length of the rejected value.
        length: usize,
    },

    /// NULL written to a non-nullable column.
    #[error("column '{column}' does not accept NULL")]
    NullViolation {
        /// Target column.
        column: String,
    },

    /// Encoded row could not be decoded.
    #[error("encoding error: {reason}")]
    Encoding {
        /// What went wrong.
        reason: String,
    },

    /// Redo log I/O error.
    #[error("redo log I/O error at {path}: {source}")]
    Io {
        /// Log file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Redo log record is unreadable.
    #[error("redo log corrupted at record {record}: {reason}")]
    RedoCorrupted {
        /// Zero-based record index.
        record: usize,
        /// What went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid storage configuration: {reason}")]
    InvalidConfig {
        /// Failed check.
        reason: String,
    },
}

impl StorageError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TableNotFound { .. } => ErrorCode::TableNotFound,
            Self::TableExists { .. } => ErrorCode::TableExists,
            Self::ColumnNotFound { .. } => ErrorCode::ColumnNotFound,
            Self::ColumnExists { .. } => ErrorCode::ColumnExists,
            Self::TooManyColumns { .. } => ErrorCode::ColumnLimitExceeded,
            Self::TypeMismatch { .. } | Self::ValueTooLong { .. } | Self::NullViolation { .. } => {
                ErrorCode::TypeMismatch
            }
            Self::Encoding { .. } | Self::RedoCorrupted { .. } => ErrorCode::Corruption,
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidConfig { .. } => ErrorCode::Validation,
        }
    }

    /// Returns true if the error is a value/type problem with a single cell.
    #[must_use]
    pub const fn is_value_error(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::ValueTooLong { .. } | Self::NullViolation { .. }
        )
    }

    /// Creates an encoding error.
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StorageError::table_not_found("t").code(),
            ErrorCode::TableNotFound
        );
        let err = StorageError::ValueTooLong {
            column: "name".to_string(),
            max_length: 150,
            length: 151,
        };
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
        assert!(err.is_value_error());
        assert!(!StorageError::encoding("x").is_value_error());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::ColumnExists {
            table: "t".to_string(),
            column: "age".to_string(),
        };
        assert_eq!(err.to_string(), "column 'age' already exists in table 't'");
    }
}
