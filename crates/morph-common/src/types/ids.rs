//! Core identifier types for MorphDB.
//!
//! These types provide type-safe wrappers around raw identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Table identifier - a UUID that doubles as the physical table name.
///
/// # Example
///
/// ```rust
/// use morph_common::types::TableId;
///
/// let id = TableId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
/// assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
/// assert!(TableId::parse("not-a-uuid").is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(Uuid);

impl TableId {
    /// Generates a fresh random table identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a textual identifier.
    ///
    /// Returns `None` for anything that is not a syntactically valid UUID,
    /// so callers can treat malformed ids exactly like unknown ones.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the name of the physical table backing this id.
    #[must_use]
    pub fn physical_name(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TableId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Row identifier - position of a row within its physical table.
///
/// Row ids are assigned by the storage engine in increasing order and
/// define the table's storage order. They are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RowId(u64);

impl RowId {
    /// First row id handed out by a fresh table.
    pub const FIRST: Self = Self(1);

    /// Creates a new `RowId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next row id.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier - uniquely identifies a storage transaction.
///
/// Committed transactions appear in the redo log in increasing order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TxnId(u64);

impl TxnId {
    /// First valid transaction id.
    pub const FIRST: Self = Self(1);

    /// Creates a new `TxnId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnId({})", self.0)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_parse() {
        let id = TableId::generate();
        let parsed = TableId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.physical_name(), id.to_string());
    }

    #[test]
    fn test_table_id_rejects_malformed() {
        assert!(TableId::parse("").is_none());
        assert!(TableId::parse("1234").is_none());
        assert!(TableId::parse("67e55044-10b1-426f-9247-bb680e5fe0cZ").is_none());
        assert!("bogus".parse::<TableId>().is_err());
    }

    #[test]
    fn test_table_id_serde_is_plain_string() {
        let id = TableId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"67e55044-10b1-426f-9247-bb680e5fe0c8\"");
    }

    #[test]
    fn test_row_id_next() {
        assert_eq!(RowId::FIRST.next(), RowId::new(2));
        assert_eq!(RowId::new(u64::MAX).next(), RowId::new(u64::MAX));
        assert!(RowId::new(3) > RowId::new(2));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", RowId::new(7)), "RowId(7)");
        assert_eq!(format!("{:?}", TxnId::new(3)), "TxnId(3)");
    }
}
