//! # morph-storage
//!
//! Physical storage for MorphDB.
//!
//! This crate holds the actual columns and rows of every table, both user
//! tables and the system tables the catalog lives in. It provides:
//!
//! - Column descriptors (`TableSchema`) and the row codec built from them
//! - Per-table stores with add/drop column support
//! - Transactions that cover DDL and DML together and roll back fully
//! - A redo log that makes committed transactions durable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StorageEngine                           │
//! │   begin() ──► Transaction (undo log + redo buffer)           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │ TableSchema │  │   Encoder   │  │  TableStore │         │
//! │  │  (columns)  │  │ (row<->buf) │  │ (per-table) │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ commit
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RedoLog                               │
//! │        (one JSON record per committed transaction)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Isolation
//!
//! The engine latches its internal maps but does not isolate transactions
//! from one another. Callers serialize schema changes per table (see the
//! `morph-txn` lock manager); a transaction must not run DDL on a table
//! that another in-flight transaction is writing.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod encoder;
mod engine;
mod error;
mod redo;
mod schema;
mod table;
mod txn;

pub use encoder::{RowDecoder, RowEncoder};
pub use engine::{StorageEngine, StorageStats};
pub use error::{StorageError, StorageResult};
pub use redo::{RedoLog, RedoOp, RedoRecord};
pub use schema::{ColumnDef, StorageType, TableSchema};
pub use table::{Row, TableSnapshot, TableStore};
pub use txn::Transaction;
