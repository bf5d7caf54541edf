use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use morph_common::FieldType;
use morph_server::{ApiResponse, Database, Router, ServerConfig};
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;

/// Builds a `{"fields": {name: token}}` request body.
pub fn fields_body(fields: &[(&str, &str)]) -> String {
    let fields: serde_json::Map<String, JsonValue> = fields
        .iter()
        .map(|(name, token)| (name.to_string(), JsonValue::from(*token)))
        .collect();
    json!({ "fields": fields }).to_string()
}

/// Wraps a row object as a `{"fields": {...}}` request body.
pub fn row_body(row: JsonValue) -> String {
    json!({ "fields": row }).to_string()
}

/// A database plus router for one test.
///
/// Persistent databases live in a scratch directory that is removed when
/// the `TestDb` is dropped.
pub struct TestDb {
    router: Router,
    config: ServerConfig,
    dir: Option<TempDir>,
}

impl TestDb {
    /// Opens an in-memory database.
    pub fn memory() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Opens an in-memory database with the given configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            router: open_router(&config),
            config,
            dir: None,
        }
    }

    /// Opens a database persisting to a fresh scratch directory.
    pub fn persistent() -> Self {
        let dir = TempDir::new().expect("failed to create scratch directory");
        let config = ServerConfig::builder()
            .data_dir(dir.path())
            .sync_on_commit(false)
            .build();
        Self {
            router: open_router(&config),
            config,
            dir: Some(dir),
        }
    }

    /// Closes the database and opens it again from the same directory.
    pub fn reopen(self) -> Self {
        let Self {
            router,
            config,
            dir,
        } = self;
        drop(router);
        Self {
            router: open_router(&config),
            config,
            dir,
        }
    }

    /// Returns the scratch directory of a persistent database.
    pub fn data_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Returns the router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the database.
    pub fn db(&self) -> &Arc<Database> {
        self.router.database()
    }

    /// Sends one request.
    pub fn request(&self, method: &str, path: &str, body: Option<&str>) -> ApiResponse {
        self.router.handle(method, path, body)
    }

    /// Creates a table and returns its id, panicking on failure.
    pub fn create_table(&self, fields: &[(&str, &str)]) -> String {
        let response = self.request("POST", "table/", Some(&fields_body(fields)));
        assert_eq!(response.status, 201, "create failed: {response}");
        response.body["model_id"]
            .as_str()
            .expect("model_id missing")
            .to_string()
    }

    /// Edits a table.
    pub fn edit_table(&self, id: &str, fields: &[(&str, &str)]) -> ApiResponse {
        self.request("PUT", &format!("table/{id}"), Some(&fields_body(fields)))
    }

    /// Inserts a row given as a JSON object.
    pub fn insert(&self, id: &str, row: JsonValue) -> ApiResponse {
        self.request("POST", &format!("table/{id}/row"), Some(&row_body(row)))
    }

    /// Lists the rows of a table, panicking on failure.
    pub fn rows(&self, id: &str) -> Vec<JsonValue> {
        let response = self.request("GET", &format!("table/{id}/rows"), None);
        assert_eq!(response.status, 200, "list failed: {response}");
        match response.body {
            JsonValue::Array(rows) => rows,
            other => panic!("expected an array, got {other}"),
        }
    }

    /// Returns a table's fields ordered by name.
    pub fn fields(&self, id: &str) -> Vec<(String, FieldType)> {
        self.db()
            .engine()
            .describe(id)
            .expect("describe failed")
            .into_iter()
            .map(|f| (f.name, f.field_type))
            .collect()
    }

    /// Returns a short lock timeout configuration for contention tests.
    pub fn short_lock_timeout() -> ServerConfig {
        ServerConfig::builder()
            .lock_timeout(Duration::from_millis(25))
            .build()
    }
}

fn open_router(config: &ServerConfig) -> Router {
    let db = Database::open(config).expect("failed to open database");
    Router::new(Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_body() {
        let body: JsonValue =
            serde_json::from_str(&fields_body(&[("name", "STR"), ("age", "NUM")])).unwrap();
        assert_eq!(body, json!({"fields": {"name": "STR", "age": "NUM"}}));
    }

    #[test]
    fn test_memory_db() {
        let db = TestDb::memory();
        assert!(db.data_dir().is_none());
        let id = db.create_table(&[("name", "STR")]);
        assert!(db.rows(&id).is_empty());
        assert_eq!(db.fields(&id), vec![("name".to_string(), FieldType::String)]);
    }

    #[test]
    fn test_persistent_reopen() {
        let db = TestDb::persistent();
        let id = db.create_table(&[("name", "STR")]);
        assert_eq!(db.insert(&id, json!({"name": "Adam"})).status, 201);

        let db = db.reopen();
        assert!(db.data_dir().is_some());
        assert_eq!(db.rows(&id), vec![json!({"name": "Adam"})]);
    }
}
