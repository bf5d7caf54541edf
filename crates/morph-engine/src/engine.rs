//! The dynamic schema engine facade.
//!
//! `SchemaEngine` wires the catalog, resolver, executor and row access
//! layer around one shared storage engine and lock manager, and exposes
//! the four client operations in terms of raw identifiers and payloads.

use std::collections::BTreeMap;
use std::sync::Arc;

use morph_common::config::EngineConfig;
use morph_common::{RowId, TableId};
use morph_storage::StorageEngine;
use morph_txn::TableLockManager;
use tracing::info;

use crate::catalog::{Catalog, Field, Group, Table};
use crate::error::{EngineError, EngineResult};
use crate::executor::{EditSummary, SchemaExecutor};
use crate::resolver::TableResolver;
use crate::rows::{RowAccess, RowObject};
use crate::typemap::parse_field_types;

/// The dynamic schema engine.
#[derive(Debug)]
pub struct SchemaEngine {
    config: EngineConfig,
    storage: Arc<StorageEngine>,
    catalog: Arc<Catalog>,
    locks: Arc<TableLockManager>,
    resolver: Arc<TableResolver>,
    executor: SchemaExecutor,
    rows: RowAccess,
}

impl SchemaEngine {
    /// Opens the engine over `storage` and ensures the default group.
    pub fn open(storage: Arc<StorageEngine>, config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::invalid_request)?;

        let catalog = Arc::new(Catalog::open(Arc::clone(&storage))?);
        catalog.ensure_group(&config.default_group, &config.default_module)?;

        let locks = Arc::new(TableLockManager::new());
        let resolver = Arc::new(TableResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&storage),
        ));
        let executor = SchemaExecutor::new(
            Arc::clone(&storage),
            Arc::clone(&catalog),
            Arc::clone(&resolver),
            Arc::clone(&locks),
            config.lock_timeout(),
        );
        let rows = RowAccess::new(
            Arc::clone(&storage),
            Arc::clone(&resolver),
            Arc::clone(&locks),
            config.lock_timeout(),
        );

        info!(
            group = %config.default_group,
            lock_timeout_ms = config.lock_timeout_ms,
            "schema engine opened"
        );
        Ok(Self {
            config,
            storage,
            catalog,
            locks,
            resolver,
            executor,
            rows,
        })
    }

    /// Opens an engine over fresh in-memory storage with default settings.
    pub fn open_memory() -> EngineResult<Self> {
        Self::open(
            Arc::new(StorageEngine::open_memory()),
            EngineConfig::default(),
        )
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Creates a table under a fresh id from `name -> type token` fields.
    pub fn create_table(&self, fields: &BTreeMap<String, String>) -> EngineResult<TableId> {
        let table_id = TableId::generate();
        self.create_table_with_id(table_id, fields)?;
        Ok(table_id)
    }

    /// Creates a table under a caller-chosen id.
    pub fn create_table_with_id(
        &self,
        table_id: TableId,
        fields: &BTreeMap<String, String>,
    ) -> EngineResult<EditSummary> {
        let fields = parse_field_types(fields)?;
        self.executor
            .create_table(&self.config.default_group, table_id, &fields)
    }

    /// Adds or replaces fields of an existing table.
    pub fn edit_table(
        &self,
        raw_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> EngineResult<EditSummary> {
        let table_id = self.require_table(raw_id)?;
        let fields = parse_field_types(fields)?;
        self.executor.edit_table(table_id, &fields)
    }

    /// Inserts a row.
    pub fn insert_row(&self, raw_id: &str, fields: &RowObject) -> EngineResult<RowId> {
        let table_id = parse_table_id(raw_id)?;
        self.rows.insert(table_id, fields)
    }

    /// Lists every row of a table.
    pub fn list_rows(&self, raw_id: &str) -> EngineResult<Vec<RowObject>> {
        let table_id = parse_table_id(raw_id)?;
        self.rows.list_rows(table_id)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns a table's fields ordered by name.
    pub fn describe(&self, raw_id: &str) -> EngineResult<Vec<Field>> {
        let table_id = self.require_table(raw_id)?;
        self.catalog.list_fields(table_id)
    }

    /// Lists the tables of the default group.
    pub fn list_tables(&self) -> EngineResult<Vec<Table>> {
        self.catalog.list_tables(&self.config.default_group)
    }

    /// Returns the default group.
    pub fn default_group(&self) -> EngineResult<Option<Group>> {
        self.catalog.get_group(&self.config.default_group)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the storage engine.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the table resolver.
    pub fn resolver(&self) -> &Arc<TableResolver> {
        &self.resolver
    }

    /// Returns the lock manager.
    pub fn locks(&self) -> &Arc<TableLockManager> {
        &self.locks
    }

    /// Parses `raw_id` and checks that the table is registered.
    ///
    /// Unknown and malformed ids are both `NotFound`.
    pub fn require_table(&self, raw_id: &str) -> EngineResult<TableId> {
        let table_id = parse_table_id(raw_id)?;
        if self.resolver.exists(table_id)? {
            Ok(table_id)
        } else {
            Err(EngineError::not_found(raw_id))
        }
    }
}

/// Parses a client-supplied table id. Malformed ids are `NotFound`.
pub fn parse_table_id(raw_id: &str) -> EngineResult<TableId> {
    TableId::parse(raw_id).ok_or_else(|| EngineError::not_found(raw_id))
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use morph_common::config::StorageConfig;
    use morph_common::FieldType;
    use serde_json::{json, Value as JsonValue};

    use super::*;

    fn decl(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    fn object(value: JsonValue) -> RowObject {
        value.as_object().cloned().unwrap()
    }

    fn summary(fields: Vec<Field>) -> Vec<(String, FieldType)> {
        fields.into_iter().map(|f| (f.name, f.field_type)).collect()
    }

    #[test]
    fn test_open_creates_default_group() {
        let engine = SchemaEngine::open_memory().unwrap();
        let group = engine.default_group().unwrap().unwrap();
        assert_eq!(group.name, "api");
        assert_eq!(group.module, "api");
    }

    #[test]
    fn test_create_round_trip() {
        let engine = SchemaEngine::open_memory().unwrap();
        let id = engine
            .create_table(&decl(&[("name", "STR"), ("age", "NUM")]))
            .unwrap();

        assert_eq!(
            summary(engine.describe(&id.to_string()).unwrap()),
            vec![
                ("age".to_string(), FieldType::Number),
                ("name".to_string(), FieldType::String)
            ]
        );
        assert_eq!(engine.list_tables().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_token_creates_nothing() {
        let engine = SchemaEngine::open_memory().unwrap();
        let err = engine.create_table(&decl(&[("name", "FOO")])).unwrap_err();
        assert!(err.is_user_error());
        assert!(engine.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let engine = SchemaEngine::open_memory().unwrap();
        let missing = TableId::generate().to_string();
        for raw in [missing.as_str(), "not-a-uuid", ""] {
            assert!(matches!(
                engine.edit_table(raw, &decl(&[("a", "NUM")])),
                Err(EngineError::NotFound { .. })
            ));
            assert!(matches!(
                engine.insert_row(raw, &RowObject::new()),
                Err(EngineError::NotFound { .. })
            ));
            assert!(matches!(
                engine.list_rows(raw),
                Err(EngineError::NotFound { .. })
            ));
        }
        assert_eq!(engine.locks().table_count(), 0);
    }

    #[test]
    fn test_edit_not_found_before_bad_token() {
        let engine = SchemaEngine::open_memory().unwrap();
        let err = engine
            .edit_table("bogus", &decl(&[("a", "FOO")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_insert_and_list_rows() {
        let engine = SchemaEngine::open_memory().unwrap();
        let id = engine
            .create_table(&decl(&[("name", "STR"), ("age", "NUM"), ("insured", "BOOL")]))
            .unwrap()
            .to_string();

        engine
            .insert_row(&id, &object(json!({"name": "Adam", "age": 23, "insured": true})))
            .unwrap();
        engine
            .insert_row(&id, &object(json!({"age": "40"})))
            .unwrap();

        let rows = engine.list_rows(&id).unwrap();
        assert_eq!(
            JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()),
            json!([
                {"age": 23, "insured": true, "name": "Adam"},
                {"age": 40, "insured": null, "name": null}
            ])
        );
    }

    #[test]
    fn test_row_validation() {
        let engine = SchemaEngine::open_memory().unwrap();
        let id = engine
            .create_table(&decl(&[("name", "STR")]))
            .unwrap()
            .to_string();

        let err = engine
            .insert_row(&id, &object(json!({"insured": true})))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownField { ref field } if field == "insured"));

        engine.edit_table(&id, &decl(&[("insured", "BOOL")])).unwrap();
        let err = engine
            .insert_row(&id, &object(json!({"insured": "Foo"})))
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
        assert!(engine.list_rows(&id).unwrap().is_empty());
    }

    #[test]
    fn test_type_change_nulls_data() {
        let engine = SchemaEngine::open_memory().unwrap();
        let id = engine
            .create_table(&decl(&[("name", "STR"), ("age", "NUM")]))
            .unwrap()
            .to_string();
        engine
            .insert_row(&id, &object(json!({"name": "Adam", "age": 23})))
            .unwrap();
        engine
            .insert_row(&id, &object(json!({"name": "Eve", "age": 30})))
            .unwrap();

        engine.edit_table(&id, &decl(&[("name", "BOOL")])).unwrap();

        let rows = engine.list_rows(&id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["name"].is_null()));
        assert_eq!(rows[0]["age"], json!(23));
        assert_eq!(rows[1]["age"], json!(30));
    }

    #[test]
    fn test_rows_see_new_fields_after_edit() {
        let engine = SchemaEngine::open_memory().unwrap();
        let id = engine
            .create_table(&decl(&[("name", "STR")]))
            .unwrap()
            .to_string();
        engine
            .insert_row(&id, &object(json!({"name": "Adam"})))
            .unwrap();

        engine.edit_table(&id, &decl(&[("insured", "BOOL")])).unwrap();
        engine
            .insert_row(&id, &object(json!({"insured": "t"})))
            .unwrap();

        let rows = engine.list_rows(&id).unwrap();
        assert_eq!(rows[0]["insured"], JsonValue::Null);
        assert_eq!(rows[1]["insured"], json!(true));
    }

    #[test]
    fn test_lock_timeout_surfaces() {
        let storage = Arc::new(StorageEngine::open_memory());
        let engine = SchemaEngine::open(
            storage,
            EngineConfig::default().with_lock_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        let id = engine.create_table(&decl(&[("a", "NUM")])).unwrap();

        let _held = engine
            .locks()
            .lock_exclusive(id, Duration::from_millis(20))
            .unwrap();
        let err = engine.list_rows(&id.to_string()).unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout(_)));
        assert!(err.code().is_retryable());
    }

    #[test]
    fn test_concurrent_inserts_during_edits() {
        let engine = Arc::new(SchemaEngine::open_memory().unwrap());
        let id = engine
            .create_table(&decl(&[("n", "NUM")]))
            .unwrap()
            .to_string();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let engine = Arc::clone(&engine);
                let id = id.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        engine
                            .insert_row(&id, &object(json!({"n": w * 100 + i})))
                            .unwrap();
                        let rows = engine.list_rows(&id).unwrap();
                        let width = rows[0].len();
                        assert!(rows.iter().all(|r| r.len() == width));
                    }
                })
            })
            .collect();

        let editor = {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    let name = format!("extra_{i}");
                    engine.edit_table(&id, &decl(&[(name.as_str(), "BOOL")])).unwrap();
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        editor.join().unwrap();

        let rows = engine.list_rows(&id).unwrap();
        assert_eq!(rows.len(), 100);
        assert!(rows.iter().all(|r| r.len() == 11));
    }

    #[test]
    fn test_persistent_engine_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::with_data_dir(dir.path());

        let id = {
            let storage = Arc::new(StorageEngine::open(config.clone()).unwrap());
            let engine = SchemaEngine::open(storage, EngineConfig::default()).unwrap();
            let id = engine
                .create_table(&decl(&[("name", "STR")]))
                .unwrap()
                .to_string();
            engine.edit_table(&id, &decl(&[("age", "NUM")])).unwrap();
            engine
                .insert_row(&id, &object(json!({"name": "Adam", "age": 23})))
                .unwrap();
            id
        };

        let storage = Arc::new(StorageEngine::open(config).unwrap());
        let engine = SchemaEngine::open(storage, EngineConfig::default()).unwrap();
        assert_eq!(engine.list_tables().unwrap().len(), 1);
        assert_eq!(
            engine.list_rows(&id).unwrap(),
            vec![object(json!({"age": 23, "name": "Adam"}))]
        );
    }
}
