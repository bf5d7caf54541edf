//! Persistence tests: committed state survives reopening a data directory.

use std::fs::OpenOptions;
use std::io::Write;

use morph_common::{FieldType, REDO_LOG_FILE_NAME};
use morph_server::{Database, DatabaseError, ServerConfig};
use morph_test::TestDb;
use serde_json::json;

fn append_to_redo_log(db: &TestDb, bytes: &[u8]) {
    let path = db.data_dir().unwrap().join(REDO_LOG_FILE_NAME);
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

#[test]
fn test_schema_and_rows_survive_reopen() {
    let db = TestDb::persistent();
    let id = db.create_table(&[("name", "STR"), ("age", "NUM")]);
    assert_eq!(db.insert(&id, json!({"name": "Adam", "age": 23})).status, 201);
    assert_eq!(db.edit_table(&id, &[("insured", "BOOL")]).status, 200);
    assert_eq!(db.insert(&id, json!({"name": "Eve", "insured": false})).status, 201);

    let db = db.reopen();
    assert_eq!(
        db.fields(&id),
        vec![
            ("age".to_string(), FieldType::Number),
            ("insured".to_string(), FieldType::Boolean),
            ("name".to_string(), FieldType::String),
        ]
    );
    assert_eq!(
        db.rows(&id),
        vec![
            json!({"age": 23, "insured": null, "name": "Adam"}),
            json!({"age": null, "insured": false, "name": "Eve"}),
        ]
    );

    // Work continues normally after replay.
    assert_eq!(db.insert(&id, json!({"name": "Seth"})).status, 201);
    let db = db.reopen();
    assert_eq!(db.rows(&id).len(), 3);
}

#[test]
fn test_type_change_survives_reopen() {
    let db = TestDb::persistent();
    let id = db.create_table(&[("name", "STR")]);
    assert_eq!(db.insert(&id, json!({"name": "Adam"})).status, 201);
    assert_eq!(db.edit_table(&id, &[("name", "NUM")]).status, 200);

    let db = db.reopen();
    assert_eq!(db.fields(&id), vec![("name".to_string(), FieldType::Number)]);
    assert_eq!(db.rows(&id), vec![json!({"name": null})]);
}

#[test]
fn test_failed_edit_is_not_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = ServerConfig::builder()
        .data_dir(dir.path())
        .sync_on_commit(false)
        .max_columns_per_table(3)
        .build();

    let id = {
        let db = TestDb::with_config(config.clone());
        let id = db.create_table(&[("a", "NUM"), ("b", "STR")]);
        assert_eq!(db.edit_table(&id, &[("c", "NUM"), ("d", "NUM")]).status, 500);
        id
    };

    let db = TestDb::with_config(config);
    assert_eq!(
        db.fields(&id),
        vec![
            ("a".to_string(), FieldType::Number),
            ("b".to_string(), FieldType::String),
        ]
    );
}

#[test]
fn test_torn_tail_is_ignored() {
    let db = TestDb::persistent();
    let id = db.create_table(&[("name", "STR")]);
    assert_eq!(db.insert(&id, json!({"name": "Adam"})).status, 201);
    append_to_redo_log(&db, br#"{"txn_id":99,"ops":[{"op":"ins"#);

    let db = db.reopen();
    assert_eq!(db.rows(&id), vec![json!({"name": "Adam"})]);

    // The torn bytes were cut off, so later commits replay cleanly.
    assert_eq!(db.insert(&id, json!({"name": "Eve"})).status, 201);
    let db = db.reopen();
    assert_eq!(db.rows(&id).len(), 2);
}

#[test]
fn test_corrupt_record_fails_open() {
    let db = TestDb::persistent();
    db.create_table(&[("name", "STR")]);
    append_to_redo_log(&db, b"not a redo record\n");

    let config = db.db().config().clone();
    let err = Database::open(&config).unwrap_err();
    assert!(matches!(err, DatabaseError::Storage(_)), "{err}");
}
