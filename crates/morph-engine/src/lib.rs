//! # morph-engine
//!
//! The dynamic schema engine for MorphDB.
//!
//! Clients define tables at runtime by naming typed fields, evolve them by
//! adding fields or changing a field's type, and insert and read rows. The
//! engine keeps three things consistent under change: the catalog of field
//! records, the physical columns, and the cached handles rows are accessed
//! through.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SchemaEngine                           │
//! │   create_table   edit_table          insert_row   list_rows   │
//! └──────────┬───────────┬───────────────────┬──────────┬────────┘
//!            │           │                   │          │
//!            ▼           ▼                   ▼          ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────┐
//! │       SchemaExecutor         │   │        RowAccess         │
//! │  X lock, one storage txn     │   │  S lock, coerce values   │
//! └──────┬───────────────┬───────┘   └────────────┬─────────────┘
//!        │               │ invalidate             │ resolve
//!        ▼               ▼                        ▼
//! ┌────────────┐  ┌──────────────────────────────────────────────┐
//! │  Catalog   │◄─┤               TableResolver                  │
//! │ (sys tabs) │  │        DashMap<TableId, Arc<TableHandle>>    │
//! └─────┬──────┘  └──────────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 StorageEngine (morph-storage)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use morph_engine::SchemaEngine;
//! use serde_json::json;
//!
//! let engine = SchemaEngine::open_memory().unwrap();
//! let fields = BTreeMap::from([("name".to_string(), "STR".to_string())]);
//! let id = engine.create_table(&fields).unwrap().to_string();
//!
//! let row = json!({"name": "Adam"});
//! engine.insert_row(&id, row.as_object().unwrap()).unwrap();
//! assert_eq!(engine.list_rows(&id).unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod engine;
pub mod error;
pub mod executor;
pub mod resolver;
pub mod rows;
pub mod typemap;

pub use catalog::{Catalog, Field, Group, Table};
pub use engine::{parse_table_id, SchemaEngine};
pub use error::{EngineError, EngineResult};
pub use executor::{EditSummary, SchemaExecutor};
pub use resolver::{ColumnHandle, TableHandle, TableResolver};
pub use rows::{RowAccess, RowObject};
pub use typemap::{physical_type, ColumnType};
