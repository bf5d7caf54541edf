//! Concurrency tests: schema edits serialize against row traffic.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use morph_engine::parse_table_id;
use morph_test::{run_mixed_workload, MixedWorkload, TestDb};
use serde_json::json;

#[test]
fn test_inserts_during_edits() {
    let db = TestDb::memory();
    let id = db.create_table(&[("name", "STR")]);

    let workload = MixedWorkload::default();
    let report = run_mixed_workload(&db, &id, workload);

    assert_eq!(report.insert_failures, 0, "{report:?}");
    assert_eq!(report.edit_failures, 0, "{report:?}");
    assert_eq!(report.torn_reads, 0, "{report:?}");
    assert_eq!(report.inserted, workload.writers * workload.rows_per_writer);
    assert_eq!(report.edits_applied, workload.edits);

    let rows = db.rows(&id);
    assert_eq!(rows.len(), report.inserted);
    for row in &rows {
        assert_eq!(row.as_object().unwrap().len(), 1 + workload.edits);
        assert!(row["name"].is_string());
    }
}

#[test]
fn test_edits_on_different_tables_do_not_block() {
    let db = TestDb::with_config(TestDb::short_lock_timeout());
    let busy = db.create_table(&[("name", "STR")]);
    let free = db.create_table(&[("name", "STR")]);

    let busy_id = parse_table_id(&busy).unwrap();
    let _guard = db
        .db()
        .engine()
        .locks()
        .lock_exclusive(busy_id, Duration::from_millis(25))
        .unwrap();

    assert_eq!(db.edit_table(&free, &[("age", "NUM")]).status, 200);
    assert_eq!(db.insert(&free, json!({"age": 1})).status, 201);

    assert_eq!(db.edit_table(&busy, &[("age", "NUM")]).status, 503);
    assert_eq!(db.insert(&busy, json!({"name": "Adam"})).status, 503);
    assert_eq!(
        db.request("GET", &format!("table/{busy}/rows"), None).status,
        503
    );
}

#[test]
fn test_insert_waits_for_exclusive_holder() {
    let db = TestDb::memory();
    let id = db.create_table(&[("name", "STR")]);
    let table_id = parse_table_id(&id).unwrap();
    let (locked_tx, locked_rx) = mpsc::channel();

    thread::scope(|s| {
        let engine = db.db().engine();
        s.spawn(move || {
            let guard = engine
                .locks()
                .lock_exclusive(table_id, Duration::from_secs(1))
                .unwrap();
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            drop(guard);
        });

        locked_rx.recv().unwrap();
        // Blocks until the holder releases, then succeeds.
        assert_eq!(db.insert(&id, json!({"name": "Adam"})).status, 201);
    });

    assert_eq!(db.db().engine().locks().stats().held(), 0);
    assert_eq!(db.rows(&id), vec![json!({"name": "Adam"})]);
}
