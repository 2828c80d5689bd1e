// crates/fitstore/src/cli/mod.rs
// CLI module for fitstore commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod open;
pub mod schema;
pub mod status;
pub mod verify;

pub use open::run_open;
pub use schema::run_schema;
pub use status::{run_heal_indices, run_status};
pub use verify::run_verify;

#[derive(Parser)]
#[command(name = "fitstore")]
#[command(about = "Versioned SQLite store for the fitness app")]
#[command(version)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the store: migrate, verify and heal indices
    Open {
        /// Store file (default: config, FITSTORE_DB_PATH, or ~/.fitstore/fitstore.db)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Schema version to reach (default: the current version)
        #[arg(short, long)]
        target: Option<u32>,

        /// Discard and recreate the store when it cannot be migrated
        #[arg(long)]
        allow_destructive_fallback: bool,

        /// Fail when the migrated schema does not match its expectations
        #[arg(long)]
        strict: bool,

        /// Skip the pre-migration backup
        #[arg(long)]
        no_backup: bool,

        /// Print the open report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the on-disk version and whether a migration is pending (read-only)
    Status {
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Check the store against the expectations of its own version
    Verify {
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Recreate missing indices without migrating
    HealIndices {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Print the DDL that creates a given schema version
    Schema {
        /// Schema version (default: the current version)
        #[arg(long)]
        version: Option<u32>,
    },
}
