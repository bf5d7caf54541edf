//! Engine error types.

use morph_common::{ErrorCode, TableId};
use morph_storage::StorageError;
use morph_txn::LockError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the dynamic schema engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request: bad field-type token, bad field name, bad shape.
    #[error("{message}")]
    Validation {
        /// Offending field, if the error concerns one.
        field: Option<String>,
        /// Human readable message.
        message: String,
    },

    /// Unknown or malformed table identifier.
    #[error("Could not find model with ID of {id}.")]
    NotFound {
        /// The identifier as the caller supplied it.
        id: String,
    },

    /// Catalog already holds a record for this table.
    #[error("table {table} already exists")]
    DuplicateTable {
        /// Existing table.
        table: TableId,
    },

    /// Existing table has a different shape, or catalog and storage disagree.
    #[error("schema conflict on table {table}: {reason}")]
    SchemaConflict {
        /// Table the conflict concerns.
        table: String,
        /// What differs.
        reason: String,
    },

    /// Row payload names a field the table does not have.
    #[error("Field '{field}' not found in model.")]
    UnknownField {
        /// The unknown field name.
        field: String,
    },

    /// Row value not coercible to the column type.
    #[error("{message}")]
    TypeMismatch {
        /// Field the value was given for.
        field: String,
        /// Human readable message.
        message: String,
    },

    /// The catalog holds a field-type token outside the known vocabulary.
    #[error("field '{field}' of table {table} has unknown type '{token}'")]
    UnknownFieldType {
        /// Table holding the field.
        table: String,
        /// Field name.
        field: String,
        /// Stored token.
        token: String,
    },

    /// The table lock was not granted in time.
    #[error(transparent)]
    LockTimeout(#[from] LockError),

    /// Physical storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Returns the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::NotFound { .. } => ErrorCode::TableNotFound,
            Self::DuplicateTable { .. } | Self::SchemaConflict { .. } => ErrorCode::SchemaConflict,
            Self::UnknownField { .. } => ErrorCode::UnknownField,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::UnknownFieldType { .. } => ErrorCode::UnknownFieldType,
            Self::LockTimeout(_) => ErrorCode::LockTimeout,
            Self::Storage(e) if e.is_value_error() => ErrorCode::TypeMismatch,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Returns true if the error was caused by caller input.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        self.code().is_user_error()
    }

    /// Creates a validation error about a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a validation error about the request as a whole.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a schema conflict error.
    pub fn conflict(table: impl ToString, reason: impl Into<String>) -> Self {
        Self::SchemaConflict {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EngineError::not_found("x").code(), ErrorCode::TableNotFound);
        assert_eq!(
            EngineError::invalid_field("name", "bad").code(),
            ErrorCode::Validation
        );
        assert_eq!(
            EngineError::DuplicateTable {
                table: TableId::generate()
            }
            .code(),
            ErrorCode::SchemaConflict
        );

        let value_error = EngineError::Storage(StorageError::NullViolation {
            column: "a".to_string(),
        });
        assert_eq!(value_error.code(), ErrorCode::TypeMismatch);
        assert_eq!(
            EngineError::Storage(StorageError::encoding("x")).code(),
            ErrorCode::StorageFailure
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(EngineError::not_found("x").is_user_error());
        assert!(EngineError::UnknownField {
            field: "insured".to_string()
        }
        .is_user_error());
        assert!(!EngineError::conflict("t", "fields differ").is_user_error());
    }

    #[test]
    fn test_display_matches_client_messages() {
        assert_eq!(
            EngineError::not_found("abc").to_string(),
            "Could not find model with ID of abc."
        );
        assert_eq!(
            EngineError::UnknownField {
                field: "insured".to_string()
            }
            .to_string(),
            "Field 'insured' not found in model."
        );
    }
}
