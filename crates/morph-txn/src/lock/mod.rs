//! Lock management for table isolation.
//!
//! This module implements a table-granular reader/writer lock manager:
//! - Shared (S) locks for row-level operations
//! - Exclusive (X) locks for schema edits
//! - Bounded waits; a request that cannot be granted in time fails
//!
//! # Lock Compatibility Matrix
//!
//! ```text
//!          │ S  │ X  │
//! ─────────┼────┼────┤
//!     S    │ ✓  │ ✗  │
//!     X    │ ✗  │ ✗  │
//! ```
//!
//! # Lock Ordering
//!
//! Each operation locks exactly one table, so no ordering is needed and
//! deadlock between operations is impossible.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use morph_common::TableId;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use thiserror::Error;
use tracing::{trace, warn};

/// Lock modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared (read) lock.
    Shared,
    /// Exclusive (write) lock.
    Exclusive,
}

impl LockMode {
    /// Returns true if this mode is compatible with another mode.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Errors from lock acquisition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The lock was not granted within the timeout.
    #[error("timed out after {waited:?} waiting for {mode} lock on table {table}")]
    Timeout {
        /// Table being locked.
        table: TableId,
        /// Requested mode.
        mode: LockMode,
        /// How long the request waited.
        waited: Duration,
    },
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Statistics about the lock manager.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Total lock acquisitions.
    pub acquisitions: AtomicU64,
    /// Total lock releases.
    pub releases: AtomicU64,
    /// Acquisitions that could not be granted immediately.
    pub waits: AtomicU64,
    /// Total timeouts.
    pub timeouts: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful acquisition.
    pub fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a release.
    pub fn record_release(&self) {
        self.releases.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a wait.
    pub fn record_wait(&self) {
        self.waits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a timeout.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Returns the number of locks currently held.
    pub fn held(&self) -> u64 {
        let acquired = self.acquisitions.load(AtomicOrdering::Relaxed);
        let released = self.releases.load(AtomicOrdering::Relaxed);
        acquired.saturating_sub(released)
    }
}

/// The owned guard. Never read; dropping it releases the lock.
enum Held {
    Shared {
        _guard: ArcRwLockReadGuard<RawRwLock, ()>,
    },
    Exclusive {
        _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
    },
}

/// A granted table lock. Released when dropped.
pub struct TableLockGuard {
    table: TableId,
    held: Held,
    stats: Arc<LockStats>,
}

impl TableLockGuard {
    /// Returns the locked table.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Returns the mode the lock is held in.
    pub fn mode(&self) -> LockMode {
        match self.held {
            Held::Shared { .. } => LockMode::Shared,
            Held::Exclusive { .. } => LockMode::Exclusive,
        }
    }
}

impl Drop for TableLockGuard {
    fn drop(&mut self) {
        self.stats.record_release();
        trace!(table = %self.table, mode = %self.mode(), "table lock released");
    }
}

impl fmt::Debug for TableLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLockGuard")
            .field("table", &self.table)
            .field("mode", &self.mode())
            .finish()
    }
}

/// The lock manager holding one reader/writer lock per table.
pub struct TableLockManager {
    /// Lock per table, created on first use.
    locks: DashMap<TableId, Arc<RwLock<()>>>,
    /// Statistics.
    stats: Arc<LockStats>,
}

impl TableLockManager {
    /// Creates a new lock manager.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            stats: Arc::new(LockStats::new()),
        }
    }

    /// Acquires a shared lock on `table`, waiting at most `timeout`.
    pub fn lock_shared(&self, table: TableId, timeout: Duration) -> LockResult<TableLockGuard> {
        self.lock(table, LockMode::Shared, timeout)
    }

    /// Acquires an exclusive lock on `table`, waiting at most `timeout`.
    pub fn lock_exclusive(&self, table: TableId, timeout: Duration) -> LockResult<TableLockGuard> {
        self.lock(table, LockMode::Exclusive, timeout)
    }

    /// Acquires a lock in the given mode.
    pub fn lock(
        &self,
        table: TableId,
        mode: LockMode,
        timeout: Duration,
    ) -> LockResult<TableLockGuard> {
        let lock = self.entry(table);

        let held = match Self::try_now(&lock, mode) {
            Some(held) => held,
            None => {
                self.stats.record_wait();
                let start = Instant::now();
                let granted = match mode {
                    LockMode::Shared => lock
                        .try_read_arc_for(timeout)
                        .map(|_guard| Held::Shared { _guard }),
                    LockMode::Exclusive => lock
                        .try_write_arc_for(timeout)
                        .map(|_guard| Held::Exclusive { _guard }),
                };
                match granted {
                    Some(held) => held,
                    None => {
                        let waited = start.elapsed();
                        self.stats.record_timeout();
                        warn!(table = %table, mode = %mode, ?waited, "table lock timed out");
                        return Err(LockError::Timeout {
                            table,
                            mode,
                            waited,
                        });
                    }
                }
            }
        };

        self.stats.record_acquisition();
        trace!(table = %table, mode = %mode, "table lock acquired");
        Ok(TableLockGuard {
            table,
            held,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Returns statistics about the lock manager.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Returns the number of tables that have a lock entry.
    pub fn table_count(&self) -> usize {
        self.locks.len()
    }

    fn entry(&self, table: TableId) -> Arc<RwLock<()>> {
        Arc::clone(
            self.locks
                .entry(table)
                .or_insert_with(|| Arc::new(RwLock::new(())))
                .value(),
        )
    }

    fn try_now(lock: &Arc<RwLock<()>>, mode: LockMode) -> Option<Held> {
        match mode {
            LockMode::Shared => lock.try_read_arc().map(|_guard| Held::Shared { _guard }),
            LockMode::Exclusive => lock.try_write_arc().map(|_guard| Held::Exclusive { _guard }),
        }
    }
}

impl Default for TableLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TableLockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLockManager")
            .field("table_count", &self.table_count())
            .field("held", &self.stats.held())
            .finish()
    }
}
