// crates/fitstore/src/db/migration/bootstrap.rs
// Index bootstrapper: best-effort creation of declared and performance indices

use super::executor::StatementExecutor;
use super::operation::{IndexSpec, StructuralOperation};
use crate::db::migration_helpers::index_exists;
use fitstore_types::{IndexBootstrapReport, IndexFailure};
use rusqlite::Connection;
use tracing::{info, warn};

/// Create every index in `specs` that is missing.
///
/// Each index stands alone: one failure is recorded and the rest still run.
/// Never fails as a whole.
pub fn ensure_indices(conn: &Connection, specs: &[IndexSpec], executor: &StatementExecutor) -> IndexBootstrapReport {
    let mut report = IndexBootstrapReport::default();

    for spec in specs {
        let existed = match index_exists(conn, &spec.name) {
            Ok(existed) => existed,
            Err(e) => {
                warn!(index = %spec.name, error = %e, "could not inspect index");
                report.failed.push(IndexFailure {
                    index: spec.name.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let op = StructuralOperation::CreateIndexIfAbsent(spec.clone());
        match executor.apply(&op, conn) {
            Ok(()) if existed => report.present.push(spec.name.clone()),
            Ok(()) => report.created.push(spec.name.clone()),
            Err(e) => {
                warn!(index = %spec.name, table = %spec.table, error = %e, "index bootstrap failed");
                report.failed.push(IndexFailure {
                    index: spec.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        created = report.created.len(),
        present = report.present.len(),
        failed = report.failed.len(),
        "index bootstrap complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_failure_does_not_stop_the_rest() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE meal_entries (id INTEGER PRIMARY KEY, date TEXT, mealType TEXT);
             CREATE INDEX index_meal_entries_date ON meal_entries (date);",
        )
        .unwrap();

        let specs = vec![
            IndexSpec::on("meal_entries", &["date"]),
            IndexSpec::on("water_entries", &["date", "timestamp"]),
            IndexSpec::on("meal_entries", &["date", "mealType"]),
        ];
        let report = ensure_indices(&conn, &specs, &StatementExecutor::default());

        assert_eq!(report.present, vec!["index_meal_entries_date"]);
        assert_eq!(report.created, vec!["index_meal_entries_date_mealType"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, "index_water_entries_date_timestamp");
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_heals_dropped_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE ai_logs (id INTEGER PRIMARY KEY, type TEXT, ts INTEGER)")
            .unwrap();
        let specs = vec![IndexSpec::on("ai_logs", &["type", "ts"])];
        let exec = StatementExecutor::default();

        assert_eq!(ensure_indices(&conn, &specs, &exec).created.len(), 1);
        conn.execute_batch("DROP INDEX index_ai_logs_type_ts").unwrap();
        let report = ensure_indices(&conn, &specs, &exec);
        assert_eq!(report.created, vec!["index_ai_logs_type_ts"]);
        assert!(report.is_clean());
    }
}
