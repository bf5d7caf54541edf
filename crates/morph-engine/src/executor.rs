//! Schema executor.
//!
//! Applies create-table and edit-table requests. Each request runs under
//! the table's exclusive lock and inside one storage transaction covering
//! both the physical column changes and the catalog field records, so a
//! failure at any step leaves the table exactly as it was.
//!
//! Edit semantics, for desired fields `D` against current fields `C`:
//!
//! ```text
//!   name in D, not in C         add       catalog field + new column
//!   name in both, same type     no-op
//!   name in both, other type    replace   drop column + field, then add anew
//!   name in C, not in D         untouched
//! ```
//!
//! A replace discards the column's data; existing rows read NULL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use morph_common::{FieldType, TableId};
use morph_storage::{ColumnDef, StorageEngine, StorageError, Transaction};
use morph_txn::TableLockManager;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{EngineError, EngineResult};
use crate::resolver::TableResolver;
use crate::typemap::{physical_type, validate_field_name};

/// Outcome of a create or edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSummary {
    /// Table the request applied to.
    pub table_id: Option<TableId>,
    /// True if the request registered a new table.
    pub created: bool,
    /// Fields added.
    pub added: Vec<String>,
    /// Fields whose type was replaced.
    pub replaced: Vec<String>,
    /// Fields already present with the requested type.
    pub unchanged: Vec<String>,
    /// Schema version after the request.
    pub schema_version: u32,
}

impl EditSummary {
    fn for_table(table_id: TableId) -> Self {
        Self {
            table_id: Some(table_id),
            ..Default::default()
        }
    }

    /// Returns true if nothing was changed.
    pub fn is_noop(&self) -> bool {
        !self.created && self.added.is_empty() && self.replaced.is_empty()
    }
}

/// Applies schema changes atomically.
#[derive(Debug)]
pub struct SchemaExecutor {
    storage: Arc<StorageEngine>,
    catalog: Arc<Catalog>,
    resolver: Arc<TableResolver>,
    locks: Arc<TableLockManager>,
    lock_timeout: Duration,
}

impl SchemaExecutor {
    /// Creates an executor.
    pub fn new(
        storage: Arc<StorageEngine>,
        catalog: Arc<Catalog>,
        resolver: Arc<TableResolver>,
        locks: Arc<TableLockManager>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            catalog,
            resolver,
            locks,
            lock_timeout,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a table with its initial fields.
    ///
    /// Creating a table that already exists with the same fields succeeds
    /// without changes; with different fields it is a `SchemaConflict`.
    pub fn create_table(
        &self,
        group: &str,
        table_id: TableId,
        fields: &BTreeMap<String, FieldType>,
    ) -> EngineResult<EditSummary> {
        for name in fields.keys() {
            validate_field_name(name)?;
        }

        let _guard = self.locks.lock_exclusive(table_id, self.lock_timeout)?;
        let result = self.create_locked(group, table_id, fields);
        self.resolver.invalidate(table_id);
        result
    }

    fn create_locked(
        &self,
        group: &str,
        table_id: TableId,
        fields: &BTreeMap<String, FieldType>,
    ) -> EngineResult<EditSummary> {
        if let Some(table) = self.catalog.find_table(table_id)? {
            if self.current_fields(table_id)? != *fields {
                return Err(EngineError::conflict(
                    table_id,
                    "table already exists with a different field set",
                ));
            }
            info!(table = %table_id, "table already exists with identical fields");
            return Ok(EditSummary {
                unchanged: fields.keys().cloned().collect(),
                schema_version: table.version,
                ..EditSummary::for_table(table_id)
            });
        }

        let physical = table_id.physical_name();
        let columns: Vec<ColumnDef> = fields
            .iter()
            .map(|(name, ft)| physical_type(*ft).column(name.clone()))
            .collect();

        // A physical table without a catalog record is adopted if it matches.
        let adopt = match self.storage.schema(&physical) {
            Ok(schema) if schema.same_columns(&columns) => true,
            Ok(_) => {
                return Err(EngineError::conflict(
                    table_id,
                    "physical table exists with different columns",
                ))
            }
            Err(StorageError::TableNotFound { .. }) => false,
            Err(e) => return Err(e.into()),
        };

        let table = self.run(table_id, "create", |txn| {
            if !adopt {
                txn.create_table(&physical, columns.clone())?;
            }
            self.catalog.create_table(txn, group, table_id, fields)
        })?;

        info!(
            table = %table_id,
            group,
            fields = fields.len(),
            adopted = adopt,
            "table created"
        );
        Ok(EditSummary {
            created: true,
            added: fields.keys().cloned().collect(),
            schema_version: table.version,
            ..EditSummary::for_table(table_id)
        })
    }

    // =========================================================================
    // Edit
    // =========================================================================

    /// Brings a table's fields in line with `fields`.
    ///
    /// Fields not named in `fields` are left untouched.
    pub fn edit_table(
        &self,
        table_id: TableId,
        fields: &BTreeMap<String, FieldType>,
    ) -> EngineResult<EditSummary> {
        for name in fields.keys() {
            validate_field_name(name)?;
        }
        if !self.resolver.exists(table_id)? {
            return Err(EngineError::not_found(table_id.to_string()));
        }

        let _guard = self.locks.lock_exclusive(table_id, self.lock_timeout)?;
        let result = self.edit_locked(table_id, fields);
        self.resolver.invalidate(table_id);
        result
    }

    fn edit_locked(
        &self,
        table_id: TableId,
        fields: &BTreeMap<String, FieldType>,
    ) -> EngineResult<EditSummary> {
        let table = self.catalog.get_table(table_id)?;
        let current = self.current_fields(table_id)?;
        let physical = table.physical_name();
        let mut summary = EditSummary::for_table(table_id);

        let version = self.run(table_id, "edit", |txn| {
            for (name, &field_type) in fields {
                match current.get(name) {
                    None => {
                        self.add_field(txn, table_id, &physical, name, field_type)?;
                        summary.added.push(name.clone());
                    }
                    Some(&existing) if existing == field_type => {
                        summary.unchanged.push(name.clone());
                    }
                    Some(_) => {
                        self.catalog.delete_field(txn, table_id, name)?;
                        txn.drop_column(&physical, name)?;
                        self.add_field(txn, table_id, &physical, name, field_type)?;
                        summary.replaced.push(name.clone());
                    }
                }
            }

            if summary.added.is_empty() && summary.replaced.is_empty() {
                Ok(table.version)
            } else {
                self.catalog.bump_version(txn, table_id)
            }
        })?;
        summary.schema_version = version;

        info!(
            table = %table_id,
            added = summary.added.len(),
            replaced = summary.replaced.len(),
            unchanged = summary.unchanged.len(),
            version,
            "table edited"
        );
        Ok(summary)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn add_field(
        &self,
        txn: &mut Transaction<'_>,
        table_id: TableId,
        physical: &str,
        name: &str,
        field_type: FieldType,
    ) -> EngineResult<()> {
        self.catalog.upsert_field(txn, table_id, name, field_type)?;
        txn.add_column(physical, physical_type(field_type).column(name))?;
        Ok(())
    }

    fn current_fields(&self, table_id: TableId) -> EngineResult<BTreeMap<String, FieldType>> {
        Ok(self
            .catalog
            .list_fields(table_id)?
            .into_iter()
            .map(|f| (f.name, f.field_type))
            .collect())
    }

    /// Runs `work` in one storage transaction, committing on success and
    /// rolling everything back on failure.
    fn run<T>(
        &self,
        table_id: TableId,
        op: &str,
        work: impl FnOnce(&mut Transaction<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut txn = self.storage.begin();
        match work(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                warn!(table = %table_id, op, error = %e, "schema change failed, rolling back");
                txn.rollback();
                Err(e)
            }
        }
    }
}
