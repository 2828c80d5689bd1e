// db/inspect.rs
// Store inspection outside the open path: status, verification, index healing

use super::migration::{SchemaCatalog, StatementExecutor, VerificationReport, ensure_indices, verify};
use super::migration_helpers::{HISTORY_TABLE, read_user_version, table_exists, user_tables};
use crate::error::{Result, StoreError};
use fitstore_types::{AppliedStep, IndexBootstrapReport, StoreStatus};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;

fn open_existing(path: &Path, flags: OpenFlags) -> Result<Connection> {
    if !path.exists() {
        return Err(StoreError::NotFound(format!("store {}", path.display())));
    }
    Ok(Connection::open_with_flags(path, flags)?)
}

fn open_read_only(path: &Path) -> Result<Connection> {
    open_existing(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
}

fn last_applied(conn: &Connection) -> rusqlite::Result<Option<AppliedStep>> {
    if !table_exists(conn, HISTORY_TABLE)? {
        return Ok(None);
    }
    conn.query_row(
        &format!("SELECT version, description, applied_at FROM {HISTORY_TABLE} ORDER BY version DESC LIMIT 1"),
        [],
        |row| {
            Ok(AppliedStep {
                version: row.get(0)?,
                description: row.get(1)?,
                applied_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Where the store stands relative to the catalog. Never writes.
pub fn store_status(path: &Path, catalog: &SchemaCatalog) -> Result<StoreStatus> {
    let current_version = catalog.latest_version();
    let mut status = StoreStatus {
        path: path.display().to_string(),
        exists: path.exists(),
        on_disk_version: 0,
        current_version,
        pending_steps: 0,
        last_applied: None,
    };
    if !status.exists {
        return Ok(status);
    }

    let conn = open_read_only(path)?;
    let version = read_user_version(&conn)?;
    let fresh = version == 0 && user_tables(&conn)?.is_empty();
    status.on_disk_version = version;
    if !fresh {
        status.pending_steps = catalog
            .steps_from(version, current_version)
            .map(|steps| steps.len() as u32)
            .unwrap_or(0);
    }
    status.last_applied = last_applied(&conn)?;
    Ok(status)
}

/// Check a store against the expectations of its own on-disk version
pub fn verify_store(path: &Path, catalog: &SchemaCatalog) -> Result<(u32, VerificationReport)> {
    let conn = open_read_only(path)?;
    let version = read_user_version(&conn)?;
    let expectations = catalog
        .expectations_at(version)
        .ok_or_else(|| StoreError::InvalidInput(format!("no schema is declared for version {version}")))?;
    Ok((version, verify(&conn, &expectations)?))
}

/// Recreate missing indices for the store's on-disk version
pub fn heal_indices(path: &Path, catalog: &SchemaCatalog, executor: &StatementExecutor) -> Result<IndexBootstrapReport> {
    let conn = open_existing(path, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
    let version = read_user_version(&conn)?;
    if catalog.model_at(version).is_none() {
        return Err(StoreError::InvalidInput(format!(
            "no schema is declared for version {version}"
        )));
    }
    Ok(ensure_indices(&conn, &catalog.bootstrap_indices(version), executor))
}

/// Native DDL of `version`, one statement per entry
pub fn schema_ddl(catalog: &SchemaCatalog, version: u32) -> Result<Vec<String>> {
    catalog
        .model_at(version)
        .map(|model| model.ddl())
        .ok_or_else(|| StoreError::InvalidInput(format!("no schema is declared for version {version}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::CURRENT_SCHEMA_VERSION;
    use crate::db::test_support::{create_store_at, test_catalog};

    #[test]
    fn test_status_of_missing_and_old_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.db");
        let catalog = test_catalog();

        let status = store_status(&path, &catalog).unwrap();
        assert!(!status.exists);
        assert!(!path.exists());

        create_store_at(&path, 12);
        let status = store_status(&path, &catalog).unwrap();
        assert_eq!(status.on_disk_version, 12);
        assert_eq!(status.pending_steps, CURRENT_SCHEMA_VERSION - 12);
        assert_eq!(status.last_applied.unwrap().description, "created fresh");
    }

    #[test]
    fn test_verify_and_heal_dropped_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.db");
        let catalog = test_catalog();
        create_store_at(&path, CURRENT_SCHEMA_VERSION);

        Connection::open(&path)
            .unwrap()
            .execute_batch("DROP INDEX index_recipes_title")
            .unwrap();
        let (version, report) = verify_store(&path, &catalog).unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
        assert_eq!(report.violations.len(), 1);

        let healed = heal_indices(&path, &catalog, &StatementExecutor::default()).unwrap();
        assert!(healed.created.contains(&"index_recipes_title".to_string()));
        assert!(verify_store(&path, &catalog).unwrap().1.is_clean());
    }

    #[test]
    fn test_schema_ddl_bounds() {
        let catalog = test_catalog();
        let ddl = schema_ddl(&catalog, 5).unwrap();
        assert!(ddl.iter().any(|s| s.contains("saved_recipes")));
        assert!(matches!(schema_ddl(&catalog, 4), Err(StoreError::InvalidInput(_))));
    }
}
