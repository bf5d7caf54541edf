//! # morph-test
//!
//! Integration tests for MorphDB.
//!
//! This crate contains:
//! - Test utilities wrapping a router over an in-memory or scratch-directory
//!   database
//! - Concurrent workload generators
//! - End-to-end tests (under `tests/`)

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Workload generators
pub mod workload;

pub use utils::{fields_body, row_body, TestDb};
pub use workload::{run_mixed_workload, MixedWorkload, WorkloadReport};
