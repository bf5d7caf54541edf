//! # morph-common
//!
//! Common types and utilities for MorphDB.
//!
//! This crate provides the foundational types shared by every MorphDB
//! component:
//!
//! - **Types**: identifiers (`TableId`, `RowId`, `TxnId`), the logical
//!   `FieldType` vocabulary, and the runtime `Value`
//! - **Errors**: stable `ErrorCode` categories used by every crate error
//! - **Config**: storage and engine configuration structures
//! - **Constants**: system-wide limits and defaults
//!
//! ## Example
//!
//! ```rust
//! use morph_common::types::{FieldType, TableId, Value};
//!
//! let id = TableId::generate();
//! assert_eq!(TableId::parse(&id.to_string()).unwrap(), id);
//! assert_eq!(FieldType::from_token("BOOL"), Some(FieldType::Boolean));
//! assert!(Value::Null.is_null());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::ErrorCode;
pub use types::{FieldType, RowId, TableId, TxnId, Value};
