// crates/fitstore/src/db/migration/verifier.rs
// Integrity verifier: checks a live store against a declarative expectation set

use super::operation::ColumnType;
use crate::db::migration_helpers::{foreign_keys, index_table, table_columns, table_exists};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExpectation {
    pub name: String,
    pub columns: Vec<(String, ColumnType)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexExpectation {
    pub name: String,
    /// When set, the index must be defined on this table
    pub table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyExpectation {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Declarative post-condition for a store; never mutates anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectationSet {
    pub tables: Vec<TableExpectation>,
    pub indices: Vec<IndexExpectation>,
    pub foreign_keys: Vec<ForeignKeyExpectation>,
}

impl ExpectationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[(&str, ColumnType)]) -> Self {
        self.tables.push(TableExpectation {
            name: name.to_string(),
            columns: columns.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
        });
        self
    }

    pub fn index(mut self, name: &str, table: Option<&str>) -> Self {
        self.indices.push(IndexExpectation {
            name: name.to_string(),
            table: table.map(str::to_string),
        });
        self
    }

    pub fn foreign_key(mut self, table: &str, column: &str, ref_table: &str, ref_column: &str) -> Self {
        self.foreign_keys.push(ForeignKeyExpectation {
            table: table.to_string(),
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.indices.len() + self.foreign_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unmet expectation. A value, not a failure: callers pick the policy.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ExpectationViolation {
    #[error("missing table {table}")]
    MissingTable { table: String },

    #[error("missing column {table}.{column}")]
    MissingColumn { table: String, column: String },

    #[error("column {table}.{column} declared as {found}, expected {expected}")]
    ColumnTypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        found: String,
    },

    #[error("missing index {index}")]
    MissingIndex { index: String },

    #[error("index {index} is on {found_table}, expected {expected_table}")]
    IndexOnWrongTable {
        index: String,
        expected_table: String,
        found_table: String,
    },

    #[error("missing foreign key {table}.{column} -> {ref_table}.{ref_column}")]
    MissingForeignKey {
        table: String,
        column: String,
        ref_table: String,
        ref_column: String,
    },

    #[error("foreign key {table}.{column} references {found}, expected {expected}")]
    MistargetedForeignKey {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("foreign key {table}.{column} references missing table {ref_table}")]
    DanglingForeignKey {
        table: String,
        column: String,
        ref_table: String,
    },
}

/// Every violation found in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub checked: usize,
    pub violations: Vec<ExpectationViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn first(&self) -> Option<&ExpectationViolation> {
        self.violations.first()
    }

    pub fn into_result(self) -> Result<(), Vec<ExpectationViolation>> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

/// Walk the whole expectation set and collect every violation.
///
/// Only read errors from the engine itself abort the walk.
pub fn verify(conn: &Connection, expectations: &ExpectationSet) -> rusqlite::Result<VerificationReport> {
    let mut report = VerificationReport {
        checked: expectations.len(),
        violations: Vec::new(),
    };
    let mut missing_tables = Vec::new();

    for table in &expectations.tables {
        if !table_exists(conn, &table.name)? {
            missing_tables.push(table.name.as_str());
            report.violations.push(ExpectationViolation::MissingTable {
                table: table.name.clone(),
            });
            continue;
        }
        let actual = table_columns(conn, &table.name)?;
        for (column, expected) in &table.columns {
            match actual.iter().find(|c| c.name == *column) {
                None => report.violations.push(ExpectationViolation::MissingColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                }),
                Some(info) if ColumnType::from_declared(&info.decl_type) != Some(*expected) => {
                    report.violations.push(ExpectationViolation::ColumnTypeMismatch {
                        table: table.name.clone(),
                        column: column.clone(),
                        expected: *expected,
                        found: info.decl_type.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    for index in &expectations.indices {
        match (index_table(conn, &index.name)?, &index.table) {
            (None, _) => report.violations.push(ExpectationViolation::MissingIndex {
                index: index.name.clone(),
            }),
            (Some(found), Some(expected)) if found != *expected => {
                report.violations.push(ExpectationViolation::IndexOnWrongTable {
                    index: index.name.clone(),
                    expected_table: expected.clone(),
                    found_table: found,
                })
            }
            _ => {}
        }
    }

    for fk in &expectations.foreign_keys {
        // A missing child table was already reported above
        if missing_tables.contains(&fk.table.as_str()) || !table_exists(conn, &fk.table)? {
            continue;
        }
        let edges = foreign_keys(conn, &fk.table)?;
        let Some(edge) = edges.iter().find(|e| e.from == fk.column) else {
            report.violations.push(ExpectationViolation::MissingForeignKey {
                table: fk.table.clone(),
                column: fk.column.clone(),
                ref_table: fk.ref_table.clone(),
                ref_column: fk.ref_column.clone(),
            });
            continue;
        };
        let found_column = edge.ref_column.as_deref().unwrap_or(fk.ref_column.as_str());
        if edge.ref_table != fk.ref_table || found_column != fk.ref_column {
            report.violations.push(ExpectationViolation::MistargetedForeignKey {
                table: fk.table.clone(),
                column: fk.column.clone(),
                expected: format!("{}.{}", fk.ref_table, fk.ref_column),
                found: format!("{}.{}", edge.ref_table, found_column),
            });
        } else if !table_exists(conn, &edge.ref_table)? {
            report.violations.push(ExpectationViolation::DanglingForeignKey {
                table: fk.table.clone(),
                column: fk.column.clone(),
                ref_table: edge.ref_table.clone(),
            });
        }
    }

    debug!(
        checked = report.checked,
        violations = report.violations.len(),
        "verification pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE cooking_sessions (id TEXT NOT NULL, recipeId TEXT NOT NULL, PRIMARY KEY(id));
             CREATE TABLE cooking_timers (id TEXT NOT NULL, sessionId TEXT NOT NULL, stepIndex INTEGER NOT NULL,
                PRIMARY KEY(id), FOREIGN KEY(sessionId) REFERENCES cooking_sessions(id) ON DELETE CASCADE);
             CREATE INDEX index_cooking_timers_sessionId ON cooking_timers (sessionId);",
        )
        .unwrap();
        conn
    }

    fn expectations() -> ExpectationSet {
        ExpectationSet::new()
            .table(
                "cooking_sessions",
                &[("id", ColumnType::Text), ("recipeId", ColumnType::Text)],
            )
            .table(
                "cooking_timers",
                &[
                    ("id", ColumnType::Text),
                    ("sessionId", ColumnType::Text),
                    ("stepIndex", ColumnType::Integer),
                ],
            )
            .index("index_cooking_timers_sessionId", Some("cooking_timers"))
            .foreign_key("cooking_timers", "sessionId", "cooking_sessions", "id")
    }

    #[test]
    fn test_clean_store_has_no_violations() {
        let conn = store();
        let report = verify(&conn, &expectations()).unwrap();
        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.checked, 4);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let conn = store();
        let exp = expectations()
            .table("weight_entries", &[("id", ColumnType::Integer)])
            .table(
                "cooking_sessions",
                &[("status", ColumnType::Text), ("recipeId", ColumnType::Integer)],
            )
            .index("index_weight_entries_dateIso", None)
            .index("index_cooking_timers_sessionId", Some("cooking_sessions"))
            .foreign_key("cooking_sessions", "recipeId", "recipes", "id");

        let violations = verify(&conn, &exp).unwrap().into_result().unwrap_err();
        assert_eq!(violations.len(), 6, "{violations:?}");
        assert!(violations.contains(&ExpectationViolation::MissingTable {
            table: "weight_entries".into()
        }));
        assert!(violations.contains(&ExpectationViolation::MissingColumn {
            table: "cooking_sessions".into(),
            column: "status".into()
        }));
        assert!(violations.iter().any(|v| matches!(
            v,
            ExpectationViolation::ColumnTypeMismatch { column, .. } if column == "recipeId"
        )));
        assert!(violations.contains(&ExpectationViolation::MissingIndex {
            index: "index_weight_entries_dateIso".into()
        }));
        assert!(violations.iter().any(|v| matches!(
            v,
            ExpectationViolation::IndexOnWrongTable { found_table, .. } if found_table == "cooking_timers"
        )));
        assert!(violations.iter().any(|v| matches!(
            v,
            ExpectationViolation::MissingForeignKey { table, .. } if table == "cooking_sessions"
        )));
    }

    #[test]
    fn test_mistargeted_and_dangling_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (id TEXT PRIMARY KEY);
             CREATE TABLE child (x TEXT, y TEXT,
                FOREIGN KEY(x) REFERENCES a(id),
                FOREIGN KEY(y) REFERENCES gone(id));",
        )
        .unwrap();
        let exp = ExpectationSet::new()
            .foreign_key("child", "x", "b", "id")
            .foreign_key("child", "y", "gone", "id");

        let report = verify(&conn, &exp).unwrap();
        assert_eq!(report.violations.len(), 2);
        assert!(matches!(
            report.violations[0],
            ExpectationViolation::MistargetedForeignKey { .. }
        ));
        assert!(matches!(
            report.violations[1],
            ExpectationViolation::DanglingForeignKey { .. }
        ));
    }

    #[test]
    fn test_violation_serializes_tagged() {
        let v = ExpectationViolation::MissingIndex {
            index: "index_ai_logs_ts".into(),
        };
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"violation\":\"missing_index\""));
        assert_eq!(v.to_string(), "missing index index_ai_logs_ts");
    }
}
