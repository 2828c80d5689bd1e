// crates/fitstore/src/cli/status.rs
// Read-only status and index healing

use anyhow::Result;
use fitstore::db::inspect::{heal_indices, store_status};
use fitstore::db::migration::StatementExecutor;
use fitstore::fitness_catalog;
use std::path::Path;

pub fn run_status(path: &Path, json: bool) -> Result<i32> {
    let catalog = fitness_catalog()?;
    let status = store_status(path, &catalog)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(0);
    }
    if !status.exists {
        println!("No store at {} (would be created at version {})", status.path, status.current_version);
        return Ok(0);
    }
    println!("Store:            {}", status.path);
    println!("On-disk version:  {}", status.on_disk_version);
    println!("Current version:  {}", status.current_version);
    if status.pending_steps > 0 {
        println!("Pending steps:    {}", status.pending_steps);
    } else if status.on_disk_version > status.current_version {
        println!("Store is newer than this build");
    } else {
        println!("Up to date");
    }
    if let Some(last) = status.last_applied {
        let when = chrono::DateTime::from_timestamp(last.applied_at, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| last.applied_at.to_string());
        println!("Last applied:     v{} {} ({when})", last.version, last.description);
    }
    Ok(0)
}

pub fn run_heal_indices(path: &Path, statement_retries: u32) -> Result<i32> {
    let catalog = fitness_catalog()?;
    let report = heal_indices(path, &catalog, &StatementExecutor::new(statement_retries))?;

    for name in &report.created {
        println!("created  {name}");
    }
    for failure in &report.failed {
        println!("FAILED   {}: {}", failure.index, failure.error);
    }
    println!(
        "{} created, {} already present, {} failed",
        report.created.len(),
        report.present.len(),
        report.failed.len()
    );
    Ok(if report.is_clean() { 0 } else { 1 })
}
