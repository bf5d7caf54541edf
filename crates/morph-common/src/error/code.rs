//! Stable error codes.

use std::fmt;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions. The high byte names the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug or broken invariant).
    Internal = 0x0001,
    /// Malformed request or unrecognized field-type token.
    Validation = 0x0002,
    /// Operation timed out.
    Timeout = 0x0003,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,
    /// Persisted data could not be decoded.
    Corruption = 0x0101,

    // Storage errors (0x0200 - 0x02FF)
    /// Physical table already exists.
    TableExists = 0x0200,
    /// Physical column already exists.
    ColumnExists = 0x0201,
    /// Physical column not found.
    ColumnNotFound = 0x0202,
    /// Per-table column limit reached.
    ColumnLimitExceeded = 0x0203,
    /// Unclassified DDL/DML failure.
    StorageFailure = 0x0204,

    // Transaction errors (0x0300 - 0x03FF)
    /// Table lock could not be acquired in time.
    LockTimeout = 0x0300,
    /// Transaction was rolled back.
    TransactionAborted = 0x0301,

    // Schema errors (0x0400 - 0x04FF)
    /// Table not found (unknown or malformed identifier).
    TableNotFound = 0x0400,
    /// Existing table has a different shape, or catalog and storage disagree.
    SchemaConflict = 0x0401,
    /// Catalog holds a field type outside the known vocabulary.
    UnknownFieldType = 0x0402,

    // Row errors (0x0500 - 0x05FF)
    /// Row payload names a field the table does not have.
    UnknownField = 0x0500,
    /// Row value not coercible to the column type.
    TypeMismatch = 0x0501,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Storage",
            0x03 => "Transaction",
            0x04 => "Schema",
            0x05 => "Row",
            _ => "Unknown",
        }
    }

    /// Returns true if the error was caused by caller input rather than
    /// by the engine or its storage.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation | Self::TableNotFound | Self::UnknownField | Self::TypeMismatch
        )
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::LockTimeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
