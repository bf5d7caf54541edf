//! Table handle resolution and caching.
//!
//! A `TableHandle` is the runtime descriptor rows are read and written
//! through: the physical table name plus the typed columns, in field-name
//! order, as of one catalog version. Handles are cached per table and
//! invalidated by the schema executor while it still holds the table's
//! exclusive lock.
//!
//! Callers must hold the table lock (shared or exclusive) while calling
//! [`TableResolver::resolve`], so a handle is never built from a schema
//! that an in-flight edit is changing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use morph_common::{FieldType, TableId};
use morph_storage::StorageEngine;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{EngineError, EngineResult};
use crate::typemap::{physical_type, ColumnType};

/// One column of a resolved table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHandle {
    /// Field and column name.
    pub name: String,
    /// Logical type.
    pub field_type: FieldType,
    /// Physical type.
    pub column_type: ColumnType,
}

/// Runtime descriptor of a table's current shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    /// Table identifier.
    pub table_id: TableId,
    /// Physical table name.
    pub physical_name: String,
    /// Columns ordered by name.
    pub columns: Vec<ColumnHandle>,
    /// Catalog version the handle was built from.
    pub schema_version: u32,
}

impl TableHandle {
    /// Returns a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnHandle> {
        self.columns
            .binary_search_by(|c| c.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.columns[i])
    }

    /// Returns the field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct ResolverStats {
    /// Lookups served from the cache.
    pub hits: AtomicU64,
    /// Lookups that built a new handle.
    pub misses: AtomicU64,
    /// Handles dropped by invalidation.
    pub invalidations: AtomicU64,
}

/// Builds and caches table handles.
#[derive(Debug)]
pub struct TableResolver {
    catalog: Arc<Catalog>,
    storage: Arc<StorageEngine>,
    cache: DashMap<TableId, Arc<TableHandle>>,
    stats: ResolverStats,
}

impl TableResolver {
    /// Creates a resolver over the given catalog and storage.
    pub fn new(catalog: Arc<Catalog>, storage: Arc<StorageEngine>) -> Self {
        Self {
            catalog,
            storage,
            cache: DashMap::new(),
            stats: ResolverStats::default(),
        }
    }

    /// Returns the handle for a table, building it on a cache miss.
    ///
    /// The caller must hold the table's lock.
    pub fn resolve(&self, table_id: TableId) -> EngineResult<Arc<TableHandle>> {
        if let Some(handle) = self.cache.get(&table_id) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(handle.value()));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(self.build(table_id)?);
        self.cache.insert(table_id, Arc::clone(&handle));
        debug!(table = %table_id, version = handle.schema_version, "table handle built");
        Ok(handle)
    }

    /// Returns true if the table is cached or registered in the catalog.
    ///
    /// Does not require the table lock.
    pub fn exists(&self, table_id: TableId) -> EngineResult<bool> {
        if self.cache.contains_key(&table_id) {
            return Ok(true);
        }
        Ok(self.catalog.find_table(table_id)?.is_some())
    }

    /// Drops the cached handle for a table.
    pub fn invalidate(&self, table_id: TableId) {
        if self.cache.remove(&table_id).is_some() {
            self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns true if a handle is cached for the table.
    pub fn is_cached(&self, table_id: TableId) -> bool {
        self.cache.contains_key(&table_id)
    }

    /// Returns the number of cached handles.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    fn build(&self, table_id: TableId) -> EngineResult<TableHandle> {
        let table = self.catalog.get_table(table_id)?;
        let columns: Vec<ColumnHandle> = self
            .catalog
            .list_fields(table_id)?
            .into_iter()
            .map(|f| ColumnHandle {
                column_type: physical_type(f.field_type),
                name: f.name,
                field_type: f.field_type,
            })
            .collect();

        let physical_name = table.physical_name();
        let schema = self.storage.schema(&physical_name)?;
        let expected: Vec<_> = columns
            .iter()
            .map(|c| c.column_type.column(c.name.clone()))
            .collect();
        if !schema.same_columns(&expected) {
            return Err(EngineError::conflict(
                table_id,
                "catalog fields do not match physical columns",
            ));
        }

        Ok(TableHandle {
            table_id,
            physical_name,
            columns,
            schema_version: table.version,
        })
    }
}
