//! # MorphDB Database
//!
//! `Database` owns the storage engine and the schema engine built on top
//! of it. Opening a database replays the redo log of the configured data
//! directory; dropping it releases both.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Database                  │
//! │                    │                      │
//! │          ┌─────────┴─────────┐            │
//! │          ▼                   ▼            │
//! │   ┌──────────────┐    ┌──────────────┐    │
//! │   │ SchemaEngine │───►│StorageEngine │    │
//! │   └──────────────┘    │ + redo log   │    │
//! │                       └──────────────┘    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use morph_server::database::Database;
//!
//! let db = Database::open_memory().unwrap();
//! assert_eq!(db.stats().user_tables, 0);
//! db.close();
//! ```

mod engine;
mod error;

pub use engine::{Database, DatabaseStats};
pub use error::{DatabaseError, DatabaseResult};
