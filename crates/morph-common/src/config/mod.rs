//! Configuration for MorphDB.
//!
//! This module provides configuration structures for the storage engine
//! and the dynamic schema engine.

mod database;

pub use database::{EngineConfig, StorageConfig};
