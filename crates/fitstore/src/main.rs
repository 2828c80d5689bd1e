// crates/fitstore/src/main.rs
// fitstore - open, migrate and inspect the fitness app store

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, open::OpenArgs};
use fitstore::config::{ResolvedConfig, fitstore_dir};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env files (global first, then working directory - local overrides)
    let _ = dotenvy::from_path(fitstore_dir().join(".env"));
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // FITSTORE_LOG wins over the per-command default
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => Level::DEBUG,
        (Commands::Open { .. }, false) => Level::INFO,
        _ => Level::WARN,
    };
    let log_level = std::env::var("FITSTORE_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(default_level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ResolvedConfig::load();
    let code = match cli.command {
        Commands::Open {
            path,
            target,
            allow_destructive_fallback,
            strict,
            no_backup,
            json,
        } => {
            let args = OpenArgs {
                path,
                target,
                allow_destructive_fallback,
                strict,
                no_backup,
                json,
            };
            cli::run_open(config, args).await?
        }
        Commands::Status { path, json } => cli::run_status(&path.unwrap_or(config.db_path), json)?,
        Commands::Verify { path, json } => cli::run_verify(&path.unwrap_or(config.db_path), json)?,
        Commands::HealIndices { path } => {
            let retries = config.options.statement_retries;
            cli::run_heal_indices(&path.unwrap_or(config.db_path), retries)?
        }
        Commands::Schema { version } => cli::run_schema(version)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
