// crates/fitstore/src/cli/open.rs
// Open command: run the full opener and report

use anyhow::Result;
use fitstore::config::{ConfigValidation, ResolvedConfig};
use fitstore::{StoreOpener, fitness_catalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct OpenArgs {
    pub path: Option<PathBuf>,
    pub target: Option<u32>,
    pub allow_destructive_fallback: bool,
    pub strict: bool,
    pub no_backup: bool,
    pub json: bool,
}

/// Returns the process exit code
pub async fn run_open(config: ResolvedConfig, args: OpenArgs) -> Result<i32> {
    let path = args.path.unwrap_or(config.db_path);
    let mut options = config.options;
    if let Some(target) = args.target {
        options.required_version = target;
    }
    // Flags can only turn these on; config and env decide otherwise
    options.allow_destructive_fallback |= args.allow_destructive_fallback;
    options.strict_verify |= args.strict;
    if args.no_backup {
        options.backup_before_migration = false;
    }

    let validation = ConfigValidation::validate(&options);
    validation.log();
    if !validation.is_valid() {
        eprintln!("{}", validation.report());
        return Ok(1);
    }

    let catalog = Arc::new(fitness_catalog()?);
    info!(path = %path.display(), target = options.required_version, "opening store");

    match StoreOpener::new(catalog, options).open(&path).await {
        Ok(handle) => {
            let report = handle.report();
            if args.json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                println!("Store ready at version {} ({})", report.final_version, path.display());
                if report.created {
                    println!("  created fresh");
                }
                if report.recreated {
                    println!("  RECREATED: previous data moved aside");
                }
                if !report.applied.is_empty() {
                    let applied: Vec<String> = report.applied.iter().map(u32::to_string).collect();
                    println!("  applied versions: {}", applied.join(", "));
                }
                if let Some(ref backup) = report.backup_path {
                    println!("  backup: {}", backup.display());
                }
                for violation in &report.violations {
                    println!("  violation: {violation}");
                }
                println!(
                    "  indices: {} created, {} present, {} failed",
                    report.index_report.created.len(),
                    report.index_report.present.len(),
                    report.index_report.failed.len()
                );
            }
            Ok(0)
        }
        Err(err) => {
            eprintln!("{}", err.diagnostic());
            Ok(err.exit_code())
        }
    }
}
