//! Type definitions for MorphDB.
//!
//! This module contains the core type definitions used across the database.

mod field_type;
mod ids;
mod value;

pub use field_type::FieldType;
pub use ids::{RowId, TableId, TxnId};
pub use value::Value;
