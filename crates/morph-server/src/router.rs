//! Request routing.
//!
//! Maps `(method, path, body)` requests onto the four schema engine
//! operations and renders results and errors as JSON with HTTP status
//! codes.
//!
//! | Method | Path                | Operation   | Success |
//! |--------|---------------------|-------------|---------|
//! | POST   | `table/`            | create      | 201     |
//! | PUT    | `table/<id>`        | edit        | 200     |
//! | POST   | `table/<id>/row`    | insert row  | 201     |
//! | GET    | `table/<id>/rows`   | list rows   | 200     |
//!
//! Request bodies carry a single `"fields"` object. For create and edit it
//! maps field names to type tokens; for row inserts it maps field names to
//! values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use morph_engine::{EngineError, RowObject};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, warn};

use crate::database::Database;

/// HTTP status codes used by the router.
pub mod status {
    /// Request succeeded.
    pub const OK: u16 = 200;
    /// Resource created.
    pub const CREATED: u16 = 201;
    /// Malformed request or invalid data.
    pub const BAD_REQUEST: u16 = 400;
    /// Unknown route or table.
    pub const NOT_FOUND: u16 = 404;
    /// Known route, wrong method.
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    /// Existing table conflicts with the request.
    pub const CONFLICT: u16 = 409;
    /// Storage or internal failure.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// Table lock not granted in time.
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// A rendered response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: JsonValue,
}

impl ApiResponse {
    /// Creates a response.
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn model_id(status: u16, id: impl fmt::Display) -> Self {
        Self::new(status, json!({ "model_id": id.to_string() }))
    }

    fn message(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into() }))
    }

    fn field_errors(messages: Vec<String>) -> Self {
        Self::new(status::BAD_REQUEST, json!({ "fields": messages }))
    }

    /// A 400 whose `key` holds messages keyed by the offending field.
    fn keyed_errors(key: &str, errors: BTreeMap<String, Vec<String>>) -> Self {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), json!(errors));
        Self::new(status::BAD_REQUEST, JsonValue::Object(body))
    }

    fn keyed_error(key: &str, field: &str, message: String) -> Self {
        Self::keyed_errors(key, BTreeMap::from([(field.to_string(), vec![message])]))
    }

    fn non_field_errors(message: impl Into<String>) -> Self {
        Self::new(
            status::BAD_REQUEST,
            json!({ "non_field_errors": [message.into()] }),
        )
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.body)
    }
}

/// Supported request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Parses a method name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    CreateTable,
    EditTable(&'a str),
    AddRow(&'a str),
    ListRows(&'a str),
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        let path = path.strip_suffix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["table"] => Some(Self::CreateTable),
            ["table", id] if !id.is_empty() => Some(Self::EditTable(id)),
            ["table", id, "row"] if !id.is_empty() => Some(Self::AddRow(id)),
            ["table", id, "rows"] if !id.is_empty() => Some(Self::ListRows(id)),
            _ => None,
        }
    }

    fn method(&self) -> Method {
        match self {
            Self::CreateTable | Self::AddRow(_) => Method::Post,
            Self::EditTable(_) => Method::Put,
            Self::ListRows(_) => Method::Get,
        }
    }
}

/// Routes requests to the schema engine.
#[derive(Debug, Clone)]
pub struct Router {
    db: Arc<Database>,
}

impl Router {
    /// Creates a router over the given database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the database.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Handles one request.
    pub fn handle(&self, method: &str, path: &str, body: Option<&str>) -> ApiResponse {
        let response = self.dispatch(method, path, body);
        debug!(method, path, status = response.status, "request handled");
        response
    }

    fn dispatch(&self, method: &str, path: &str, body: Option<&str>) -> ApiResponse {
        let Some(route) = Route::parse(path) else {
            return ApiResponse::message(status::NOT_FOUND, "Not found.");
        };
        if Method::parse(method) != Some(route.method()) {
            return ApiResponse::message(
                status::METHOD_NOT_ALLOWED,
                format!("Method \"{}\" not allowed.", method.to_ascii_uppercase()),
            );
        }

        match route {
            Route::CreateTable => self.create_table(body),
            Route::EditTable(id) => self.edit_table(id, body),
            Route::AddRow(id) => self.add_row(id, body),
            Route::ListRows(id) => self.list_rows(id),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn create_table(&self, body: Option<&str>) -> ApiResponse {
        let result = parse_fields(body)
            .and_then(|fields| token_map(&fields))
            .and_then(|tokens| {
                self.db
                    .engine()
                    .create_table(&tokens)
                    .map_err(|e| error_response(&e))
            });
        match result {
            Ok(id) => ApiResponse::model_id(status::CREATED, id),
            Err(response) => response,
        }
    }

    fn edit_table(&self, raw_id: &str, body: Option<&str>) -> ApiResponse {
        let engine = self.db.engine();
        let result = engine
            .require_table(raw_id)
            .map_err(|e| error_response(&e))
            .and_then(|table_id| {
                let tokens = parse_fields(body).and_then(|fields| token_map(&fields))?;
                engine
                    .edit_table(raw_id, &tokens)
                    .map(|_| table_id)
                    .map_err(|e| error_response(&e))
            });
        match result {
            Ok(table_id) => ApiResponse::model_id(status::OK, table_id),
            Err(response) => response,
        }
    }

    fn add_row(&self, raw_id: &str, body: Option<&str>) -> ApiResponse {
        let engine = self.db.engine();
        let result = engine
            .require_table(raw_id)
            .map_err(|e| error_response(&e))
            .and_then(|table_id| parse_fields(body).map(|fields| (table_id, fields)))
            .and_then(|(table_id, fields)| {
                engine
                    .insert_row(raw_id, &fields)
                    .map(|_| table_id)
                    .map_err(|e| error_response(&e))
            });
        match result {
            Ok(table_id) => ApiResponse::model_id(status::CREATED, table_id),
            Err(response) => response,
        }
    }

    fn list_rows(&self, raw_id: &str) -> ApiResponse {
        match self.db.engine().list_rows(raw_id) {
            Ok(rows) => ApiResponse::new(
                status::OK,
                JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()),
            ),
            Err(e) => error_response(&e),
        }
    }
}

// =============================================================================
// Request parsing
// =============================================================================

/// Extracts the `"fields"` object from a request body.
fn parse_fields(body: Option<&str>) -> Result<RowObject, ApiResponse> {
    let body = body.map(str::trim).filter(|b| !b.is_empty()).unwrap_or("{}");
    let parsed: JsonValue = serde_json::from_str(body)
        .map_err(|e| ApiResponse::non_field_errors(format!("JSON parse error - {e}")))?;

    let JsonValue::Object(mut object) = parsed else {
        return Err(ApiResponse::non_field_errors(format!(
            "Invalid data. Expected a dictionary, but got {}.",
            json_kind(&parsed)
        )));
    };

    match object.remove("fields") {
        Some(JsonValue::Object(fields)) => Ok(fields),
        None | Some(JsonValue::Null) => Err(ApiResponse::field_errors(vec![
            "This field is required.".to_string(),
        ])),
        Some(other) => Err(ApiResponse::field_errors(vec![format!(
            "Expected a dictionary of items but got type \"{}\".",
            json_kind(&other)
        )])),
    }
}

/// Converts a `"fields"` object into `name -> type token`.
fn token_map(fields: &RowObject) -> Result<BTreeMap<String, String>, ApiResponse> {
    let mut tokens = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for (name, token) in fields {
        match token {
            JsonValue::String(token) => {
                tokens.insert(name.clone(), token.clone());
            }
            other => {
                let shown = match other {
                    JsonValue::Null => "None".to_string(),
                    other => other.to_string(),
                };
                errors.insert(
                    name.clone(),
                    vec![format!("\"{}\" is not a valid choice.", shown)],
                );
            }
        }
    }
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(ApiResponse::keyed_errors("fields", errors))
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "dict",
    }
}

// =============================================================================
// Error rendering
// =============================================================================

/// Renders an engine error with its status code.
///
/// Validation and type errors about one field are keyed by that field's
/// name: `{"fields": {"<name>": [...]}}` and `{"error": {"<name>": [...]}}`.
pub fn error_response(err: &EngineError) -> ApiResponse {
    let message = err.to_string();
    match err {
        EngineError::Validation {
            field: Some(field), ..
        } => ApiResponse::keyed_error("fields", field, message),
        EngineError::Validation { field: None, .. } => ApiResponse::non_field_errors(message),
        EngineError::NotFound { .. } => ApiResponse::message(status::NOT_FOUND, message),
        EngineError::UnknownField { .. } => ApiResponse::field_errors(vec![message]),
        EngineError::TypeMismatch { field, .. } => ApiResponse::keyed_error("error", field, message),
        EngineError::SchemaConflict { .. } | EngineError::DuplicateTable { .. } => {
            warn!(error = %message, "schema conflict");
            ApiResponse::message(status::CONFLICT, message)
        }
        EngineError::LockTimeout(_) => {
            warn!(error = %message, "request timed out waiting for table lock");
            ApiResponse::message(status::SERVICE_UNAVAILABLE, message)
        }
        EngineError::UnknownFieldType { .. } | EngineError::Storage(_) => {
            error!(error = %message, code = ?err.code(), "request failed");
            ApiResponse::message(status::INTERNAL_SERVER_ERROR, message)
        }
    }
}
