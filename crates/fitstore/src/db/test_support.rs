// db/test_support.rs
// Shared test helpers for store tests

use super::migration::{MigrationRunner, SchemaCatalog};
use super::opener::{OpenOptions, StoreHandle, StoreOpener};
use super::schema::fitness_catalog;
use std::path::Path;
use std::sync::Arc;

/// The fitness catalog, shared
pub fn test_catalog() -> Arc<SchemaCatalog> {
    Arc::new(fitness_catalog().expect("fitness catalog must be valid"))
}

/// Write a store file whose schema is exactly the native schema of `version`
pub fn create_store_at(path: &Path, version: u32) {
    let catalog = test_catalog();
    let mut conn = rusqlite::Connection::open(path).expect("Failed to open store file");
    MigrationRunner::new(&catalog)
        .create_fresh(&mut conn, version)
        .expect("Failed to create store");
}

/// A Ready store at the current version in its own temp dir
pub async fn setup_test_store() -> (tempfile::TempDir, StoreHandle) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = OpenOptions {
        strict_verify: true,
        ..OpenOptions::default()
    };
    let handle = StoreOpener::new(test_catalog(), options)
        .open(dir.path().join("fit.db"))
        .await
        .expect("Failed to open test store");
    (dir, handle)
}
