use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde_json::{json, Value as JsonValue};

use crate::utils::{fields_body, row_body, TestDb};

/// Shape of a mixed insert/edit/read workload against one table.
///
/// The table must have a `name` STR field. Writers insert rows naming only
/// that field while a single editor adds `extra_<n>` NUM fields and readers
/// list rows.
#[derive(Debug, Clone, Copy)]
pub struct MixedWorkload {
    /// Concurrent writer threads.
    pub writers: usize,
    /// Rows each writer inserts.
    pub rows_per_writer: usize,
    /// Schema edits applied by the editor thread.
    pub edits: usize,
    /// Concurrent reader threads.
    pub readers: usize,
    /// Row listings each reader performs.
    pub reads_per_reader: usize,
}

impl Default for MixedWorkload {
    fn default() -> Self {
        Self {
            writers: 4,
            rows_per_writer: 25,
            edits: 10,
            readers: 2,
            reads_per_reader: 20,
        }
    }
}

/// Outcome of a workload run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkloadReport {
    /// Rows inserted successfully.
    pub inserted: usize,
    /// Inserts that failed.
    pub insert_failures: usize,
    /// Edits applied successfully.
    pub edits_applied: usize,
    /// Edits that failed.
    pub edit_failures: usize,
    /// Listings whose rows did not all carry the same field set.
    pub torn_reads: usize,
}

/// Runs the workload against table `id` and reports what happened.
pub fn run_mixed_workload(db: &TestDb, id: &str, workload: MixedWorkload) -> WorkloadReport {
    let inserted = AtomicUsize::new(0);
    let insert_failures = AtomicUsize::new(0);
    let edits_applied = AtomicUsize::new(0);
    let edit_failures = AtomicUsize::new(0);
    let torn_reads = AtomicUsize::new(0);
    let router = db.router();
    let rows_path = format!("table/{id}/rows");
    let row_path = format!("table/{id}/row");

    thread::scope(|s| {
        for writer in 0..workload.writers {
            let (inserted, insert_failures, row_path) = (&inserted, &insert_failures, &row_path);
            s.spawn(move || {
                for n in 0..workload.rows_per_writer {
                    let body = row_body(json!({ "name": format!("w{writer}-{n}") }));
                    if router.handle("POST", row_path, Some(&body)).is_success() {
                        inserted.fetch_add(1, Ordering::Relaxed);
                    } else {
                        insert_failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }

        let (edits_applied, edit_failures) = (&edits_applied, &edit_failures);
        s.spawn(move || {
            for n in 0..workload.edits {
                let field = format!("extra_{n}");
                let body = fields_body(&[(field.as_str(), "NUM")]);
                if router
                    .handle("PUT", &format!("table/{id}"), Some(&body))
                    .is_success()
                {
                    edits_applied.fetch_add(1, Ordering::Relaxed);
                } else {
                    edit_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        for _ in 0..workload.readers {
            let (torn_reads, rows_path) = (&torn_reads, &rows_path);
            s.spawn(move || {
                for _ in 0..workload.reads_per_reader {
                    let response = router.handle("GET", rows_path, None);
                    if let JsonValue::Array(rows) = response.body {
                        if !same_field_sets(&rows) {
                            torn_reads.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    WorkloadReport {
        inserted: inserted.into_inner(),
        insert_failures: insert_failures.into_inner(),
        edits_applied: edits_applied.into_inner(),
        edit_failures: edit_failures.into_inner(),
        torn_reads: torn_reads.into_inner(),
    }
}

fn same_field_sets(rows: &[JsonValue]) -> bool {
    let mut sets = rows.iter().map(|row| {
        row.as_object()
            .map(|o| o.keys().cloned().collect::<BTreeSet<_>>())
            .unwrap_or_default()
    });
    match sets.next() {
        Some(first) => sets.all(|set| set == first),
        None => true,
    }
}
