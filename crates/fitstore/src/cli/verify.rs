// crates/fitstore/src/cli/verify.rs
// Verify command: expectations of the store's own version

use anyhow::Result;
use fitstore::db::inspect::verify_store;
use fitstore::fitness_catalog;
use std::path::Path;

/// Exit code 1 when any expectation is unmet
pub fn run_verify(path: &Path, json: bool) -> Result<i32> {
    let catalog = fitness_catalog()?;
    let (version, report) = verify_store(path, &catalog)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_clean() {
        println!("Store at version {version}: {} expectations met", report.checked);
    } else {
        println!("Store at version {version}: {} violation(s)", report.violations.len());
        for violation in &report.violations {
            println!("  - {violation}");
        }
    }
    Ok(if report.is_clean() { 0 } else { 1 })
}
