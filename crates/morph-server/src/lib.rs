//! # morph-server
//!
//! Database facade and request front end for MorphDB.
//!
//! This crate provides:
//!
//! - **Database**: opens storage (replaying the redo log of a persistent
//!   data directory) and the schema engine over it. This is the main entry
//!   point for using MorphDB as an embedded library.
//!
//! - **Router**: maps `(method, path, body)` requests onto the four
//!   schema engine operations and renders JSON responses with HTTP status
//!   codes.
//!
//! - **Config**: the TOML server configuration.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use morph_server::{Database, Router};
//!
//! let router = Router::new(Arc::new(Database::open_memory().unwrap()));
//!
//! let created = router.handle("POST", "table/", Some(r#"{"fields": {"name": "STR"}}"#));
//! assert_eq!(created.status, 201);
//! let id = created.body["model_id"].as_str().unwrap();
//!
//! let path = format!("table/{id}/row");
//! let inserted = router.handle("POST", &path, Some(r#"{"fields": {"name": "Adam"}}"#));
//! assert_eq!(inserted.status, 201);
//!
//! let rows = router.handle("GET", &format!("table/{id}/rows"), None);
//! assert_eq!(rows.body[0]["name"], "Adam");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Server configuration.
pub mod config;

/// Database facade wiring storage and the schema engine.
pub mod database;

/// Request routing.
pub mod router;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use database::{Database, DatabaseError, DatabaseResult, DatabaseStats};
pub use router::{error_response, ApiResponse, Method, Router};
