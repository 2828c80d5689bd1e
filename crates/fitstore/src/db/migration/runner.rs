// crates/fitstore/src/db/migration/runner.rs
// Migration runner: walks the catalog one step at a time, one transaction per step

use super::catalog::{MigrationStep, SchemaCatalog};
use super::error::{MigrationError, StatementError};
use super::executor::StatementExecutor;
use crate::db::migration_helpers::{
    foreign_key_violations, foreign_keys_enabled, read_user_version, record_history,
    write_user_version,
};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Cooperative cancellation, observed between steps only
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MigrationRunner<'a> {
    catalog: &'a SchemaCatalog,
    executor: StatementExecutor,
    cancel: Option<CancelFlag>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            executor: StatementExecutor::default(),
            cancel: None,
        }
    }

    pub fn with_executor(mut self, executor: StatementExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    /// Bring the store to `target`, returning every version reached in order.
    ///
    /// With `allow_fallback`, an eligible failure comes back as
    /// [`MigrationError::RecreateRequested`]; the store itself is left at the
    /// last committed version either way.
    pub fn migrate(
        &self,
        conn: &mut Connection,
        target: u32,
        allow_fallback: bool,
    ) -> Result<Vec<u32>, MigrationError> {
        let current = read_user_version(conn).map_err(MigrationError::ReadVersion)?;
        match self.run_chain(conn, current, target) {
            Ok(trail) => Ok(trail),
            Err(err) if allow_fallback && err.allows_fallback() => {
                let at_version = read_user_version(conn).unwrap_or(current);
                warn!(at_version, target, error = %err, "migration failed, requesting recreate");
                Err(MigrationError::RecreateRequested {
                    at_version,
                    cause: Box::new(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn run_chain(&self, conn: &mut Connection, current: u32, target: u32) -> Result<Vec<u32>, MigrationError> {
        let steps = self.catalog.steps_from(current, target)?;
        if steps.is_empty() {
            return Ok(Vec::new());
        }
        info!(from = current, to = target, steps = steps.len(), "migrating store");

        let mut trail = Vec::with_capacity(steps.len());
        for step in steps {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                info!(at_version = step.from, "migration cancelled");
                return Err(MigrationError::Cancelled { at_version: step.from });
            }
            self.apply_step(conn, step)?;

            let found = read_user_version(conn).map_err(MigrationError::ReadVersion)?;
            if found != step.to {
                return Err(MigrationError::VersionMismatch {
                    from: step.from,
                    to: step.to,
                    found,
                });
            }
            trail.push(step.to);
        }
        Ok(trail)
    }

    /// One step in one IMMEDIATE transaction, with FK enforcement suspended around it
    fn apply_step(&self, conn: &mut Connection, step: &MigrationStep) -> Result<(), MigrationError> {
        let enforcing = foreign_keys_enabled(conn).map_err(|e| step_sql_error(step, e))?;
        if enforcing {
            conn.pragma_update(None, "foreign_keys", false)
                .map_err(|e| step_sql_error(step, e))?;
        }

        let result = self.apply_step_in_transaction(conn, step);

        if enforcing && let Err(e) = conn.pragma_update(None, "foreign_keys", true) {
            warn!(error = %e, "failed to re-enable foreign keys after migration step");
        }
        result
    }

    fn apply_step_in_transaction(&self, conn: &mut Connection, step: &MigrationStep) -> Result<(), MigrationError> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| step_sql_error(step, e))?;

        // Orphans that predate the step are not its fault
        let before = foreign_key_violations(&tx).map_err(|e| step_sql_error(step, e))?;

        for op in &step.operations {
            self.executor
                .apply(op, &tx)
                .map_err(|source| step_error(step, source))?;
        }

        let after = foreign_key_violations(&tx).map_err(|e| step_sql_error(step, e))?;
        if let Some((child, rowid, parent)) = after.iter().find(|v| !before.contains(v)) {
            let row = rowid.map_or_else(|| "?".to_string(), |r| r.to_string());
            return Err(step_error(
                step,
                StatementError::structural(
                    child,
                    format!("row {row} references a missing {parent} row"),
                ),
            ));
        }

        write_user_version(&tx, step.to).map_err(|e| step_sql_error(step, e))?;
        record_history(&tx, step.to, &step.description).map_err(|e| step_sql_error(step, e))?;
        tx.commit().map_err(|e| step_sql_error(step, e))?;

        info!(from = step.from, to = step.to, description = %step.description, "applied migration step");
        Ok(())
    }

    /// Create the schema of `target` directly on an empty store
    pub fn create_fresh(&self, conn: &mut Connection, target: u32) -> Result<(), MigrationError> {
        let ops = self
            .catalog
            .native_operations_at(target)
            .ok_or(MigrationError::UnknownVersion(target))?;
        let fresh_error = |source| MigrationError::Step { from: 0, to: target, source };

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| fresh_error(StatementError::from_sqlite("schema", e)))?;
        for op in &ops {
            self.executor.apply(op, &tx).map_err(fresh_error)?;
        }
        write_user_version(&tx, target).map_err(|e| fresh_error(StatementError::from_sqlite("schema", e)))?;
        record_history(&tx, target, "created fresh")
            .map_err(|e| fresh_error(StatementError::from_sqlite("schema", e)))?;
        tx.commit()
            .map_err(|e| fresh_error(StatementError::from_sqlite("schema", e)))?;

        info!(version = target, objects = ops.len(), "created fresh store");
        Ok(())
    }
}

fn step_error(step: &MigrationStep, source: StatementError) -> MigrationError {
    MigrationError::Step {
        from: step.from,
        to: step.to,
        source,
    }
}

fn step_sql_error(step: &MigrationStep, err: rusqlite::Error) -> MigrationError {
    step_error(step, StatementError::from_sqlite("schema", err))
}
