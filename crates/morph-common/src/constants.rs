//! System-wide constants for MorphDB.

// =============================================================================
// Schema Limits
// =============================================================================

/// Maximum length, in characters, of a STRING field value.
pub const MAX_STRING_LENGTH: usize = 150;

/// Maximum length, in characters, of group names, modules and field names.
pub const MAX_NAME_LENGTH: usize = 255;

/// Default maximum number of physical columns per table.
pub const DEFAULT_MAX_COLUMNS_PER_TABLE: usize = 1600;

// =============================================================================
// Catalog Constants
// =============================================================================

/// Prefix reserved for system tables holding the catalog.
pub const SYSTEM_TABLE_PREFIX: &str = "_morph_";

/// Name of the group created at bootstrap when none is configured.
pub const DEFAULT_GROUP_NAME: &str = "api";

/// Module recorded for the bootstrap group.
pub const DEFAULT_GROUP_MODULE: &str = "api";

// =============================================================================
// Concurrency Constants
// =============================================================================

/// Default time to wait for a table lock, in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Durability Constants
// =============================================================================

/// File name of the redo log inside the data directory.
pub const REDO_LOG_FILE_NAME: &str = "morph.redo";
