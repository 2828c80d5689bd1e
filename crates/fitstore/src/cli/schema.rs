// crates/fitstore/src/cli/schema.rs
// Schema command: native DDL of one version

use anyhow::Result;
use fitstore::db::inspect::schema_ddl;
use fitstore::{CURRENT_SCHEMA_VERSION, fitness_catalog};

pub fn run_schema(version: Option<u32>) -> Result<i32> {
    let catalog = fitness_catalog()?;
    let version = version.unwrap_or(CURRENT_SCHEMA_VERSION);
    println!("-- schema version {version}");
    for statement in schema_ddl(&catalog, version)? {
        println!("{statement};");
    }
    println!("PRAGMA user_version = {version};");
    Ok(0)
}
