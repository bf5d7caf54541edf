//! Metadata catalog for groups, tables and fields.
//!
//! Catalog records are rows of three system tables kept in the same
//! storage engine as user tables. Writes take the caller's storage
//! transaction, so a schema edit commits or rolls back its catalog rows
//! together with its physical column changes.
//!
//! ```text
//!   _morph_groups   name, module
//!   _morph_tables   id, group, version
//!   _morph_fields   table, name, field_type
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use morph_common::{FieldType, RowId, TableId, Value, MAX_NAME_LENGTH};
use morph_storage::{
    ColumnDef, Row, StorageEngine, StorageError, StorageType, TableSnapshot, Transaction,
};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::typemap::physical_type_for_token;

/// System table holding groups.
pub const GROUPS_TABLE: &str = "_morph_groups";
/// System table holding tables.
pub const TABLES_TABLE: &str = "_morph_tables";
/// System table holding fields.
pub const FIELDS_TABLE: &str = "_morph_fields";

const ID_LENGTH: usize = 36;
const TOKEN_LENGTH: usize = 8;

/// A namespace that tables belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Owning module.
    pub module: String,
}

/// A runtime-defined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table identifier, also the physical table name.
    pub id: TableId,
    /// Owning group.
    pub group: String,
    /// Schema version, bumped on every edit that changes a field.
    pub version: u32,
}

impl Table {
    /// Returns the physical table name.
    pub fn physical_name(&self) -> String {
        self.id.physical_name()
    }
}

/// A field of a runtime table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Owning table.
    pub table: TableId,
    /// Field name, also the physical column name.
    pub name: String,
    /// Logical type.
    pub field_type: FieldType,
}

fn system_tables() -> Vec<(&'static str, Vec<ColumnDef>)> {
    let text = |len| StorageType::Varchar { max_length: len };
    vec![
        (
            GROUPS_TABLE,
            vec![
                ColumnDef::new("name", text(MAX_NAME_LENGTH), false),
                ColumnDef::new("module", text(MAX_NAME_LENGTH), false),
            ],
        ),
        (
            TABLES_TABLE,
            vec![
                ColumnDef::new("id", text(ID_LENGTH), false),
                ColumnDef::new("group", text(MAX_NAME_LENGTH), false),
                ColumnDef::new("version", StorageType::Integer, false),
            ],
        ),
        (
            FIELDS_TABLE,
            vec![
                ColumnDef::new("table", text(ID_LENGTH), false),
                ColumnDef::new("name", text(MAX_NAME_LENGTH), false),
                ColumnDef::new("field_type", text(TOKEN_LENGTH), false),
            ],
        ),
    ]
}

/// Catalog over the system tables of a storage engine.
#[derive(Debug)]
pub struct Catalog {
    storage: Arc<StorageEngine>,
}

impl Catalog {
    /// Opens the catalog, creating any missing system tables.
    pub fn open(storage: Arc<StorageEngine>) -> EngineResult<Self> {
        let missing: Vec<_> = system_tables()
            .into_iter()
            .filter(|(name, _)| !storage.table_exists(name))
            .collect();

        if !missing.is_empty() {
            let mut txn = storage.begin();
            for (name, columns) in &missing {
                txn.create_table(name, columns.clone())?;
            }
            txn.commit()?;
            info!(created = missing.len(), "catalog system tables created");
        }

        Ok(Self { storage })
    }

    /// Returns the underlying storage engine.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Creates a group if it does not exist yet and returns it.
    pub fn ensure_group(&self, name: &str, module: &str) -> EngineResult<Group> {
        if let Some(group) = self.get_group(name)? {
            return Ok(group);
        }
        check_name("group name", name)?;
        check_name("group module", module)?;

        let mut txn = self.storage.begin();
        txn.insert(
            GROUPS_TABLE,
            &[
                ("name".to_string(), Value::string(name)),
                ("module".to_string(), Value::string(module)),
            ],
        )?;
        txn.commit()?;

        info!(group = name, module, "group created");
        Ok(Group {
            name: name.to_string(),
            module: module.to_string(),
        })
    }

    /// Looks up a group by name.
    pub fn get_group(&self, name: &str) -> EngineResult<Option<Group>> {
        let snapshot = self.storage.scan(GROUPS_TABLE)?;
        for row in &snapshot.rows {
            if text(&snapshot, row, "name")? == name {
                return Ok(Some(Group {
                    name: name.to_string(),
                    module: text(&snapshot, row, "module")?.to_string(),
                }));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Registers a table and its initial fields.
    ///
    /// Fails with `DuplicateTable` if the table is already registered.
    pub fn create_table(
        &self,
        txn: &mut Transaction<'_>,
        group: &str,
        id: TableId,
        fields: &BTreeMap<String, FieldType>,
    ) -> EngineResult<Table> {
        if self.get_group(group)?.is_none() {
            return Err(EngineError::invalid_request(format!(
                "Group '{}' does not exist.",
                group
            )));
        }
        if self.find_table(id)?.is_some() {
            return Err(EngineError::DuplicateTable { table: id });
        }

        let table = Table {
            id,
            group: group.to_string(),
            version: 1,
        };
        Self::insert_table_row(txn, &table)?;
        for (name, field_type) in fields {
            Self::insert_field_row(txn, id, name, *field_type)?;
        }
        Ok(table)
    }

    /// Looks up a table.
    pub fn find_table(&self, id: TableId) -> EngineResult<Option<Table>> {
        let key = id.to_string();
        let snapshot = self.storage.scan(TABLES_TABLE)?;
        for row in &snapshot.rows {
            if text(&snapshot, row, "id")? == key {
                return table_from_row(&snapshot, row).map(Some);
            }
        }
        Ok(None)
    }

    /// Gets a table, failing with `NotFound` if absent.
    pub fn get_table(&self, id: TableId) -> EngineResult<Table> {
        self.find_table(id)?
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    /// Lists the tables of a group, ordered by id.
    pub fn list_tables(&self, group: &str) -> EngineResult<Vec<Table>> {
        let snapshot = self.storage.scan(TABLES_TABLE)?;
        let mut tables = Vec::new();
        for row in &snapshot.rows {
            if text(&snapshot, row, "group")? == group {
                tables.push(table_from_row(&snapshot, row)?);
            }
        }
        tables.sort_by_key(|t| t.id.to_string());
        Ok(tables)
    }

    /// Increments a table's schema version and returns the new value.
    pub fn bump_version(&self, txn: &mut Transaction<'_>, id: TableId) -> EngineResult<u32> {
        let mut table = self.get_table(id)?;
        let key = id.to_string();
        for row_id in self.matching_rows(TABLES_TABLE, |s, r| Ok(text(s, r, "id")? == key))? {
            txn.delete(TABLES_TABLE, row_id)?;
        }
        table.version = table.version.saturating_add(1);
        Self::insert_table_row(txn, &table)?;
        Ok(table.version)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Lists a table's fields ordered by name.
    pub fn list_fields(&self, id: TableId) -> EngineResult<Vec<Field>> {
        let key = id.to_string();
        let snapshot = self.storage.scan(FIELDS_TABLE)?;
        let mut fields = Vec::new();
        for row in &snapshot.rows {
            if text(&snapshot, row, "table")? != key {
                continue;
            }
            let name = text(&snapshot, row, "name")?;
            let token = text(&snapshot, row, "field_type")?;
            let (field_type, _) = physical_type_for_token(&key, name, token)?;
            fields.push(Field {
                table: id,
                name: name.to_string(),
                field_type,
            });
        }
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fields)
    }

    /// Records a field, replacing any existing record with the same name.
    pub fn upsert_field(
        &self,
        txn: &mut Transaction<'_>,
        id: TableId,
        name: &str,
        field_type: FieldType,
    ) -> EngineResult<()> {
        self.delete_field(txn, id, name)?;
        Self::insert_field_row(txn, id, name, field_type)
    }

    /// Deletes a field record. Returns false if there was none.
    pub fn delete_field(
        &self,
        txn: &mut Transaction<'_>,
        id: TableId,
        name: &str,
    ) -> EngineResult<bool> {
        let key = id.to_string();
        let rows = self.matching_rows(FIELDS_TABLE, |s, r| {
            Ok(text(s, r, "table")? == key && text(s, r, "name")? == name)
        })?;
        for row_id in &rows {
            txn.delete(FIELDS_TABLE, *row_id)?;
        }
        Ok(!rows.is_empty())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn matching_rows(
        &self,
        table: &str,
        pred: impl Fn(&TableSnapshot, &Row) -> EngineResult<bool>,
    ) -> EngineResult<Vec<RowId>> {
        let snapshot = self.storage.scan(table)?;
        let mut ids = Vec::new();
        for row in &snapshot.rows {
            if pred(&snapshot, row)? {
                ids.push(row.id);
            }
        }
        Ok(ids)
    }

    fn insert_table_row(txn: &mut Transaction<'_>, table: &Table) -> EngineResult<()> {
        let version = i32::try_from(table.version).unwrap_or(i32::MAX);
        txn.insert(
            TABLES_TABLE,
            &[
                ("id".to_string(), Value::string(table.id.to_string())),
                ("group".to_string(), Value::string(table.group.clone())),
                ("version".to_string(), Value::Int(version)),
            ],
        )?;
        Ok(())
    }

    fn insert_field_row(
        txn: &mut Transaction<'_>,
        id: TableId,
        name: &str,
        field_type: FieldType,
    ) -> EngineResult<()> {
        txn.insert(
            FIELDS_TABLE,
            &[
                ("table".to_string(), Value::string(id.to_string())),
                ("name".to_string(), Value::string(name)),
                ("field_type".to_string(), Value::string(field_type.token())),
            ],
        )?;
        Ok(())
    }
}

fn check_name(what: &str, name: &str) -> EngineResult<()> {
    let length = name.chars().count();
    if length == 0 || length > MAX_NAME_LENGTH {
        return Err(EngineError::invalid_request(format!(
            "The {} must have between 1 and {} characters (it has {}).",
            what, MAX_NAME_LENGTH, length
        )));
    }
    Ok(())
}

fn corrupt(reason: String) -> EngineError {
    EngineError::Storage(StorageError::encoding(reason))
}

fn text<'a>(snapshot: &TableSnapshot, row: &'a Row, column: &str) -> EngineResult<&'a str> {
    snapshot
        .value(row, column)
        .and_then(Value::as_str)
        .ok_or_else(|| corrupt(format!("catalog column '{}' is not text", column)))
}

fn table_from_row(snapshot: &TableSnapshot, row: &Row) -> EngineResult<Table> {
    let raw = text(snapshot, row, "id")?;
    let id = TableId::parse(raw).ok_or_else(|| corrupt(format!("bad table id '{}'", raw)))?;
    let version = snapshot
        .value(row, "version")
        .and_then(Value::as_int)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| corrupt(format!("bad version for table {}", raw)))?;
    Ok(Table {
        id,
        group: text(snapshot, row, "group")?.to_string(),
        version,
    })
}

#[cfg(test)]
mod tests {
    use morph_common::SYSTEM_TABLE_PREFIX;

    use super::*;

    fn catalog() -> Catalog {
        let catalog = Catalog::open(Arc::new(StorageEngine::open_memory())).unwrap();
        catalog.ensure_group("api", "api").unwrap();
        catalog
    }

    fn fields(pairs: &[(&str, FieldType)]) -> BTreeMap<String, FieldType> {
        pairs.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    fn create(catalog: &Catalog, id: TableId, pairs: &[(&str, FieldType)]) -> Table {
        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        let table = catalog.create_table(&mut txn, "api", id, &fields(pairs)).unwrap();
        txn.commit().unwrap();
        table
    }

    #[test]
    fn test_system_tables_created_once() {
        let storage = Arc::new(StorageEngine::open_memory());
        Catalog::open(Arc::clone(&storage)).unwrap();
        Catalog::open(Arc::clone(&storage)).unwrap();

        let tables = storage.list_tables();
        assert_eq!(tables.len(), 3);
        assert!(tables.iter().all(|t| t.starts_with(SYSTEM_TABLE_PREFIX)));
        assert_eq!(storage.stats().committed, 1);
    }

    #[test]
    fn test_ensure_group() {
        let catalog = catalog();
        let again = catalog.ensure_group("api", "other").unwrap();
        assert_eq!(again.module, "api");
        assert!(catalog.get_group("missing").unwrap().is_none());
        assert!(catalog.ensure_group("", "api").is_err());
    }

    #[test]
    fn test_create_and_get_table() {
        let catalog = catalog();
        let id = TableId::generate();
        let table = create(
            &catalog,
            id,
            &[("name", FieldType::String), ("age", FieldType::Number)],
        );
        assert_eq!(table.version, 1);
        assert_eq!(catalog.get_table(id).unwrap(), table);

        let listed: Vec<_> = catalog
            .list_fields(id)
            .unwrap()
            .into_iter()
            .map(|f| (f.name, f.field_type))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("age".to_string(), FieldType::Number),
                ("name".to_string(), FieldType::String)
            ]
        );
        assert_eq!(catalog.list_tables("api").unwrap(), vec![table]);
    }

    #[test]
    fn test_duplicate_table() {
        let catalog = catalog();
        let id = TableId::generate();
        create(&catalog, id, &[]);

        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        let err = catalog
            .create_table(&mut txn, "api", id, &fields(&[]))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTable { table } if table == id));
    }

    #[test]
    fn test_unknown_group_and_table() {
        let catalog = catalog();
        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        let err = catalog
            .create_table(&mut txn, "nope", TableId::generate(), &fields(&[]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));

        let err = catalog.get_table(TableId::generate()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_upsert_and_delete_field() {
        let catalog = catalog();
        let id = TableId::generate();
        create(&catalog, id, &[("name", FieldType::String)]);

        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        catalog
            .upsert_field(&mut txn, id, "name", FieldType::Boolean)
            .unwrap();
        catalog
            .upsert_field(&mut txn, id, "insured", FieldType::Boolean)
            .unwrap();
        assert!(!catalog.delete_field(&mut txn, id, "missing").unwrap());
        assert_eq!(catalog.bump_version(&mut txn, id).unwrap(), 2);
        txn.commit().unwrap();

        let listed: Vec<_> = catalog
            .list_fields(id)
            .unwrap()
            .into_iter()
            .map(|f| (f.name, f.field_type))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("insured".to_string(), FieldType::Boolean),
                ("name".to_string(), FieldType::Boolean)
            ]
        );
        assert_eq!(catalog.get_table(id).unwrap().version, 2);
    }

    #[test]
    fn test_rollback_discards_catalog_rows() {
        let catalog = catalog();
        let id = TableId::generate();
        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        catalog
            .create_table(&mut txn, "api", id, &fields(&[("a", FieldType::Number)]))
            .unwrap();
        txn.rollback();

        assert!(catalog.find_table(id).unwrap().is_none());
        assert!(catalog.list_fields(id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_stored_token() {
        let catalog = catalog();
        let id = TableId::generate();
        create(&catalog, id, &[]);

        let storage = Arc::clone(catalog.storage());
        let mut txn = storage.begin();
        txn.insert(
            FIELDS_TABLE,
            &[
                ("table".to_string(), Value::string(id.to_string())),
                ("name".to_string(), Value::string("when")),
                ("field_type".to_string(), Value::string("DATE")),
            ],
        )
        .unwrap();
        txn.commit().unwrap();

        let err = catalog.list_fields(id).unwrap_err();
        assert!(matches!(err, EngineError::UnknownFieldType { ref token, .. } if token == "DATE"));
    }
}
