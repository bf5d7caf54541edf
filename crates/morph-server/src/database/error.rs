//! Database error types.

use morph_common::ErrorCode;
use morph_engine::EngineError;
use morph_storage::StorageError;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Invalid server configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Storage could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Schema engine error.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl DatabaseError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::Validation,
            Self::Storage(e) => e.code(),
            Self::Engine(e) => e.code(),
        }
    }
}

/// Database result type.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
