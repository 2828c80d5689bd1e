// crates/fitstore/src/db/opener.rs
// Store opener: takes a store file from whatever state it is in to Ready
//
// States: Unopened -> Opening -> Migrating -> Verifying -> Ready, with
// FallbackRecreate reachable from Opening and Migrating when destructive
// fallback is allowed, and FailedPermanently as the terminal failure.
//
// The state machine runs on one dedicated blocking connection. Only a Ready
// store is handed to the pool, whose per-connection setup turns WAL on.

use super::meals::MealStore;
use super::migration::{
    CancelFlag, ExpectationViolation, MigrationError, MigrationRunner, SchemaCatalog, StatementExecutor,
    ensure_indices, verify,
};
use super::migration_helpers::{read_user_version, user_tables};
use super::pool::{PoolSettings, StorePool, backup_before_migration, ensure_parent_directory, sibling_path};
use super::recipes::RecipeStore;
use super::schema::{CURRENT_SCHEMA_VERSION, fitness_catalog};
use super::streaks::StreakStore;
use super::sync_operations::SyncQueue;
use super::weights::WeightStore;
use crate::error::{FatalOpenError, FatalOpenKind};
use fitstore_types::IndexBootstrapReport;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpenState {
    Unopened,
    Opening,
    Migrating,
    Verifying,
    FallbackRecreate,
    Ready,
    FailedPermanently,
}

/// Knobs for one open. `allow_destructive_fallback` is off unless asked for.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub required_version: u32,
    pub allow_destructive_fallback: bool,
    /// Treat verification violations as fatal (CI and migration tests)
    pub strict_verify: bool,
    pub backup_before_migration: bool,
    pub statement_retries: u32,
    pub busy_timeout_ms: u64,
    pub pool_size: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            required_version: CURRENT_SCHEMA_VERSION,
            allow_destructive_fallback: false,
            strict_verify: false,
            backup_before_migration: true,
            statement_retries: super::migration::executor::DEFAULT_IO_RETRIES,
            busy_timeout_ms: PoolSettings::default().busy_timeout_ms,
            pool_size: PoolSettings::default().max_size,
        }
    }
}

/// What happened while opening
#[derive(Debug, Clone, Serialize)]
pub struct OpenReport {
    pub path: PathBuf,
    /// On-disk version found at open; `None` when the file was unreadable
    pub initial_version: Option<u32>,
    pub final_version: u32,
    pub trail: Vec<OpenState>,
    /// Versions committed by the runner, in order
    pub applied: Vec<u32>,
    pub violations: Vec<ExpectationViolation>,
    pub index_report: IndexBootstrapReport,
    pub created: bool,
    pub recreated: bool,
    pub backup_path: Option<PathBuf>,
    pub discarded_path: Option<PathBuf>,
}

impl OpenReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            initial_version: None,
            final_version: 0,
            trail: vec![OpenState::Unopened],
            applied: Vec::new(),
            violations: Vec::new(),
            index_report: IndexBootstrapReport::default(),
            created: false,
            recreated: false,
            backup_path: None,
            discarded_path: None,
        }
    }

    fn enter(&mut self, state: OpenState) {
        info!(state = %state, path = %self.path.display(), "store open transition");
        self.trail.push(state);
    }

    pub fn state(&self) -> OpenState {
        self.trail.last().copied().unwrap_or(OpenState::Unopened)
    }
}

/// Outcome of the Opening state
enum Opened {
    Fresh(Connection),
    Existing(Connection, u32),
    /// Not a database, or a corrupt one. The only outcome a recreate may replace.
    Unreadable(String),
    /// Locked by another connection past the busy timeout, an I/O fault, or any other failure
    Unavailable(FatalOpenKind, String),
}

/// Sort a failure to read the store header into unreadable or merely unavailable
fn classify_open_error(err: rusqlite::Error) -> Opened {
    use rusqlite::ffi::ErrorCode;
    match err.sqlite_error_code() {
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => Opened::Unreadable(err.to_string()),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Opened::Unavailable(FatalOpenKind::Busy, err.to_string()),
        _ => Opened::Unavailable(FatalOpenKind::Unopenable, err.to_string()),
    }
}

#[derive(Clone)]
pub struct StoreOpener {
    catalog: Arc<SchemaCatalog>,
    options: OpenOptions,
    cancel: Option<CancelFlag>,
}

impl StoreOpener {
    pub fn new(catalog: Arc<SchemaCatalog>, options: OpenOptions) -> Self {
        Self {
            catalog,
            options,
            cancel: None,
        }
    }

    /// Honoured between migration steps only
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    fn runner(&self) -> MigrationRunner<'_> {
        let runner = MigrationRunner::new(&self.catalog)
            .with_executor(StatementExecutor::new(self.options.statement_retries));
        match &self.cancel {
            Some(flag) => runner.with_cancel(flag.clone()),
            None => runner,
        }
    }

    /// Open, migrate and verify on the async runtime, then hand the store to a pool
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<StoreHandle, FatalOpenError> {
        let path = path.as_ref().to_path_buf();
        let opener = self.clone();
        let task_path = path.clone();
        let (conn, report) = tokio::task::spawn_blocking(move || opener.migrate_in_place(&task_path))
            .await
            .map_err(|e| FatalOpenError::new(&path, FatalOpenKind::Unopenable, format!("open task failed: {e}")))??;
        drop(conn);

        let settings = PoolSettings {
            max_size: self.options.pool_size,
            busy_timeout_ms: self.options.busy_timeout_ms,
        };
        let pool = StorePool::open(&path, settings).await.map_err(|e| {
            FatalOpenError::new(&path, FatalOpenKind::Unopenable, format!("{e:#}"))
                .at_version(Some(report.final_version))
        })?;

        Ok(StoreHandle {
            pool: Arc::new(pool),
            report: Arc::new(report),
        })
    }

    /// The blocking state machine. Returns the migration connection of a Ready store.
    pub fn migrate_in_place(&self, path: &Path) -> Result<(Connection, OpenReport), FatalOpenError> {
        let required = self.options.required_version;
        let allow_fallback = self.options.allow_destructive_fallback;
        let mut report = OpenReport::new(path);

        report.enter(OpenState::Opening);
        if self.catalog.model_at(required).is_none() {
            report.enter(OpenState::FailedPermanently);
            return Err(FatalOpenError::new(
                path,
                FatalOpenKind::ChainConfiguration,
                format!(
                    "no schema is declared for version {required}; the catalog covers {} to {}",
                    self.catalog.baseline_version(),
                    self.catalog.latest_version()
                ),
            ));
        }

        let conn = match self.open_file(path) {
            Opened::Fresh(mut conn) => {
                report.initial_version = Some(0);
                report.enter(OpenState::Migrating);
                self.runner().create_fresh(&mut conn, required).map_err(|e| {
                    report.enter(OpenState::FailedPermanently);
                    FatalOpenError::new(path, FatalOpenKind::Migration, e.to_string()).at_version(Some(0))
                })?;
                report.created = true;
                conn
            }
            Opened::Existing(mut conn, version) => {
                report.initial_version = Some(version);
                if self.options.backup_before_migration {
                    report.backup_path = self.backup_if_pending(&conn, path, version);
                }

                report.enter(OpenState::Migrating);
                match self.runner().migrate(&mut conn, required, allow_fallback) {
                    Ok(applied) => {
                        report.applied = applied;
                        conn
                    }
                    Err(MigrationError::RecreateRequested { at_version, cause }) => {
                        warn!(at_version, error = %cause, "migration cannot complete, recreating store");
                        drop(conn);
                        self.recreate(path, &mut report)?
                    }
                    Err(err) => {
                        let reached = read_user_version(&conn).ok();
                        report.enter(OpenState::FailedPermanently);
                        return Err(FatalOpenError::new(path, FatalOpenKind::Migration, err.to_string())
                            .at_version(reached));
                    }
                }
            }
            Opened::Unreadable(reason) if allow_fallback => {
                warn!(path = %path.display(), %reason, "store unreadable, recreating");
                self.recreate(path, &mut report)?
            }
            Opened::Unreadable(reason) => {
                report.enter(OpenState::FailedPermanently);
                return Err(FatalOpenError::new(path, FatalOpenKind::Unopenable, reason));
            }
            Opened::Unavailable(kind, reason) => {
                warn!(path = %path.display(), %reason, "store unavailable, leaving it in place");
                report.enter(OpenState::FailedPermanently);
                return Err(FatalOpenError::new(path, kind, reason));
            }
        };

        report.enter(OpenState::Verifying);
        self.verify_and_heal(&conn, path, &mut report)?;

        report.final_version = required;
        report.enter(OpenState::Ready);
        info!(
            path = %path.display(),
            from = ?report.initial_version,
            to = required,
            created = report.created,
            recreated = report.recreated,
            "store ready"
        );
        Ok((conn, report))
    }

    /// Opening: a fresh file, an existing store at some version, or something unreadable
    fn open_file(&self, path: &Path) -> Opened {
        if let Err(e) = ensure_parent_directory(path) {
            return Opened::Unavailable(FatalOpenKind::Unopenable, format!("{e:#}"));
        }
        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => return Opened::Unavailable(FatalOpenKind::Unopenable, e.to_string()),
        };
        // A lock held elsewhere is waited out here before it surfaces as busy
        if let Err(e) = conn.busy_timeout(Duration::from_millis(self.options.busy_timeout_ms)) {
            return Opened::Unavailable(FatalOpenKind::Unopenable, e.to_string());
        }

        // Header and schema reads fail here for files that are not databases
        let version = match read_user_version(&conn) {
            Ok(v) => v,
            Err(e) => return classify_open_error(e),
        };
        let tables = match user_tables(&conn) {
            Ok(t) => t,
            Err(e) => return classify_open_error(e),
        };

        if version == 0 && tables.is_empty() {
            info!(path = %path.display(), "no schema present, creating fresh store");
            Opened::Fresh(conn)
        } else {
            info!(path = %path.display(), version, tables = tables.len(), "found existing store");
            Opened::Existing(conn, version)
        }
    }

    /// Backup only when there is something to apply. Failure is logged, never fatal.
    fn backup_if_pending(&self, conn: &Connection, path: &Path, version: u32) -> Option<PathBuf> {
        let pending = self
            .catalog
            .steps_from(version, self.options.required_version)
            .is_ok_and(|steps| !steps.is_empty());
        if !pending {
            return None;
        }
        match backup_before_migration(conn, path) {
            Ok(backup) => Some(backup),
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "pre-migration backup failed, continuing");
                None
            }
        }
    }

    /// FallbackRecreate: move the old file aside and create the required version natively
    fn recreate(&self, path: &Path, report: &mut OpenReport) -> Result<Connection, FatalOpenError> {
        report.enter(OpenState::FallbackRecreate);
        let required = self.options.required_version;
        let fail = |report: &mut OpenReport, message: String| {
            report.enter(OpenState::FailedPermanently);
            FatalOpenError::new(path, FatalOpenKind::Recreate, message)
        };

        let discarded = match discard_store_files(path) {
            Ok(d) => d,
            Err(e) => return Err(fail(report, format!("could not move store aside: {e}"))),
        };
        if let Some(ref moved) = discarded {
            warn!(from = %path.display(), to = %moved.display(), "previous store moved aside");
        }
        report.discarded_path = discarded;

        let mut conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => return Err(fail(report, e.to_string())),
        };
        if let Err(e) = self.runner().create_fresh(&mut conn, required) {
            return Err(fail(report, e.to_string()));
        }
        report.recreated = true;
        Ok(conn)
    }

    /// Verifying: collect every violation, then recreate missing indices
    fn verify_and_heal(&self, conn: &Connection, path: &Path, report: &mut OpenReport) -> Result<(), FatalOpenError> {
        let required = self.options.required_version;
        let expectations = self.catalog.expectations_at(required).unwrap_or_default();

        let verification = verify(conn, &expectations).map_err(|e| {
            report.enter(OpenState::FailedPermanently);
            FatalOpenError::new(path, FatalOpenKind::Verification, e.to_string()).at_version(Some(required))
        })?;

        for violation in &verification.violations {
            warn!(version = required, %violation, "schema expectation not met");
        }
        if !verification.is_clean() && self.options.strict_verify {
            report.enter(OpenState::FailedPermanently);
            let count = verification.violations.len();
            return Err(FatalOpenError::new(
                path,
                FatalOpenKind::Verification,
                format!("{count} expectation violation(s) in strict mode"),
            )
            .at_version(Some(required))
            .with_violation(verification.first().cloned()));
        }
        report.violations = verification.violations;

        let executor = StatementExecutor::new(self.options.statement_retries);
        report.index_report = ensure_indices(conn, &self.catalog.bootstrap_indices(required), &executor);
        Ok(())
    }
}

/// Rename the store to `<path>.discarded` and remove its journal companions
fn discard_store_files(path: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut moved = None;
    if path.exists() {
        let target = sibling_path(path, ".discarded");
        if target.exists() {
            std::fs::remove_file(&target)?;
        }
        std::fs::rename(path, &target)?;
        moved = Some(target);
    }
    for suffix in ["-wal", "-shm", "-journal"] {
        let companion = sibling_path(path, suffix);
        if companion.exists() {
            std::fs::remove_file(&companion)?;
        }
    }
    Ok(moved)
}

/// Handle to a Ready store. Cheap to clone; pass it to whoever needs rows.
#[derive(Clone)]
pub struct StoreHandle {
    pool: Arc<StorePool>,
    report: Arc<OpenReport>,
}

impl StoreHandle {
    pub fn pool(&self) -> &Arc<StorePool> {
        &self.pool
    }

    pub fn report(&self) -> &OpenReport {
        &self.report
    }

    pub fn path(&self) -> &Path {
        self.pool.path()
    }

    pub fn version(&self) -> u32 {
        self.report.final_version
    }

    pub fn recipes(&self) -> RecipeStore {
        RecipeStore::new(self.pool.clone())
    }

    pub fn streaks(&self) -> StreakStore {
        StreakStore::new(self.pool.clone())
    }

    pub fn weights(&self) -> WeightStore {
        WeightStore::new(self.pool.clone())
    }

    pub fn meals(&self) -> MealStore {
        MealStore::new(self.pool.clone())
    }

    pub fn sync_operations(&self) -> SyncQueue {
        SyncQueue::new(self.pool.clone())
    }
}

/// Open the fitness store at `path`, bringing it to `required_version`.
///
/// Called once at startup. With `allow_destructive_fallback` an unusable
/// store is moved aside and recreated empty; without it the caller gets a
/// [`FatalOpenError`] and the file is left as it was.
pub async fn open_store(
    path: impl AsRef<Path>,
    required_version: u32,
    allow_destructive_fallback: bool,
) -> Result<StoreHandle, FatalOpenError> {
    let path = path.as_ref();
    let catalog = fitness_catalog()
        .map_err(|e| FatalOpenError::new(path, FatalOpenKind::ChainConfiguration, e.to_string()))?;
    let options = OpenOptions {
        required_version,
        allow_destructive_fallback,
        ..OpenOptions::default()
    };
    StoreOpener::new(Arc::new(catalog), options).open(path).await
}
