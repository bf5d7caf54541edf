//! # morph-txn
//!
//! Table-level concurrency control for MorphDB.
//!
//! Every runtime table carries one reader/writer lock:
//!
//! - **Shared (S)**: held by row inserts and row listings. Any number of
//!   shared holders may run on a table at once.
//! - **Exclusive (X)**: held for the whole of a schema edit, from the first
//!   catalog read until commit or rollback, so no row operation ever sees a
//!   half-applied schema.
//!
//! Locks on different tables never interact. Acquisition waits up to a
//! configured timeout and then fails with [`LockError::Timeout`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   TableLockManager                        │
//! │                                                           │
//! │   DashMap<TableId, Arc<RwLock<()>>>     LockStats         │
//! │        │                                                  │
//! │        ├── lock_shared(id)    ──► TableLockGuard (S)      │
//! │        └── lock_exclusive(id) ──► TableLockGuard (X)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use morph_common::TableId;
//! use morph_txn::{LockMode, TableLockManager};
//!
//! let locks = TableLockManager::new();
//! let table = TableId::generate();
//!
//! let a = locks.lock_shared(table, Duration::from_millis(10)).unwrap();
//! let b = locks.lock_shared(table, Duration::from_millis(10)).unwrap();
//! assert_eq!(a.mode(), LockMode::Shared);
//! assert!(locks.lock_exclusive(table, Duration::from_millis(10)).is_err());
//! drop((a, b));
//! assert!(locks.lock_exclusive(table, Duration::from_millis(10)).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Table lock implementation.
///
/// This module provides:
/// - [`lock::TableLockManager`]: Owns one lock per table
/// - [`lock::TableLockGuard`]: RAII guard released on drop
/// - [`lock::LockMode`]: Shared and Exclusive modes
pub mod lock;

pub use lock::{LockError, LockMode, LockResult, LockStats, TableLockGuard, TableLockManager};
