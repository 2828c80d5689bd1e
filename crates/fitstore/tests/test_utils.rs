//! Test utilities for fitstore integration tests

#![allow(dead_code)]

use fitstore::db::migration::{MigrationRunner, SchemaCatalog};
use fitstore::db::migration_helpers::{read_user_version, table_columns, user_indices, user_tables};
use fitstore::fitness_catalog;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub fn catalog() -> Arc<SchemaCatalog> {
    Arc::new(fitness_catalog().expect("fitness catalog must be valid"))
}

/// Baseline plus only the first `steps` steps of the fitness chain
pub fn truncated_catalog(steps: usize) -> Arc<SchemaCatalog> {
    let chain = fitstore::db::schema::steps();
    Arc::new(
        SchemaCatalog::new(fitstore::db::schema::baseline(), chain[..steps].to_vec())
            .expect("truncated chain is still contiguous"),
    )
}

/// Temp dir holding a store file created natively at `version`
pub struct TestStore {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestStore {
    pub fn at_version(version: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("fit.db");
        let catalog = catalog();
        let mut conn = Connection::open(&path).expect("Failed to create store file");
        MigrationRunner::new(&catalog)
            .create_fresh(&mut conn, version)
            .expect("Failed to create store");
        Self { dir, path }
    }

    /// Path of a store that does not exist yet
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("fit.db");
        Self { dir, path }
    }

    pub fn conn(&self) -> Connection {
        Connection::open(&self.path).expect("Failed to open store file")
    }

    pub fn execute(&self, sql: &str) {
        self.conn().execute_batch(sql).expect("Failed to seed store");
    }

    pub fn version(&self) -> u32 {
        read_user_version(&self.conn()).expect("Failed to read version")
    }

    pub fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Structural snapshot: every table with its columns, plus every named index
#[derive(Debug, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub tables: Vec<(String, Vec<(String, String, bool, Option<String>, i64)>)>,
    pub indices: Vec<(String, String)>,
}

pub fn snapshot(conn: &Connection) -> SchemaSnapshot {
    let tables = user_tables(conn)
        .unwrap()
        .into_iter()
        .map(|table| {
            let columns = table_columns(conn, &table)
                .unwrap()
                .into_iter()
                .map(|c| (c.name, c.decl_type.to_uppercase(), c.not_null, c.default, c.pk))
                .collect();
            (table, columns)
        })
        .collect();
    SchemaSnapshot {
        tables,
        indices: user_indices(conn).unwrap(),
    }
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
        .unwrap()
}

pub fn file_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("Failed to read store file")
}
