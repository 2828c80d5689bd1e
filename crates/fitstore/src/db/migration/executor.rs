// crates/fitstore/src/db/migration/executor.rs
// Statement executor: applies one idempotent structural operation at a time
//
// Every operation runs inside `SAVEPOINT structural_op`, so it is atomic both
// on a bare connection and inside a step transaction. A failed operation is
// rolled back to the savepoint and leaves nothing behind.
//
// Table rebuilds follow the shadow-table pattern:
//   1. create `<table>__rebuild` with the new shape
//   2. copy rows one at a time through the column mapping
//   3. drop the original
//   4. rename the shadow into place
// A leftover shadow from an interrupted attempt is discarded and the rebuild
// re-runs; a table that already has the new shape is left alone.

use super::error::StatementError;
use super::operation::{ColumnSource, CopyRows, IndexSpec, RebuildTable, StructuralOperation, TableSchema};
use crate::db::migration_helpers::{
    column_exists, foreign_key_violations, foreign_keys_enabled, index_columns, index_table, quote_ident, table_columns,
    table_exists,
};
use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::{debug, info, warn};

/// Default number of extra attempts after an I/O-class failure
pub const DEFAULT_IO_RETRIES: u32 = 3;

/// Points between rebuild sub-steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RebuildStage {
    ShadowCreated,
    RowsCopied,
    OriginalDropped,
    Renamed,
}

#[derive(Debug, Clone)]
pub struct StatementExecutor {
    max_io_retries: u32,
    #[cfg(test)]
    fault_after: Option<RebuildStage>,
}

impl Default for StatementExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_IO_RETRIES)
    }
}

impl StatementExecutor {
    pub fn new(max_io_retries: u32) -> Self {
        Self {
            max_io_retries,
            #[cfg(test)]
            fault_after: None,
        }
    }

    /// Fail every rebuild right after `stage`
    #[cfg(test)]
    pub(crate) fn with_fault_after(mut self, stage: RebuildStage) -> Self {
        self.fault_after = Some(stage);
        self
    }

    pub fn max_io_retries(&self) -> u32 {
        self.max_io_retries
    }

    /// Apply one operation, retrying I/O-class failures a bounded number of times
    pub fn apply(&self, op: &StructuralOperation, conn: &Connection) -> Result<(), StatementError> {
        let _suspension = if op.drops_table() {
            Some(ForeignKeySuspension::begin(conn, op.target())?)
        } else {
            None
        };

        let mut attempt = 0;
        loop {
            match self.apply_once(op, conn) {
                Err(err) if err.is_retryable() && attempt < self.max_io_retries => {
                    attempt += 1;
                    warn!(
                        operation = %op,
                        attempt,
                        max = self.max_io_retries,
                        error = %err,
                        "retrying structural operation"
                    );
                }
                other => return other,
            }
        }
    }

    fn apply_once(&self, op: &StructuralOperation, conn: &Connection) -> Result<(), StatementError> {
        let object = op.target();
        conn.execute_batch("SAVEPOINT structural_op")
            .map_err(|e| StatementError::from_sqlite(object, e))?;

        match self.dispatch(op, conn) {
            Ok(()) => conn
                .execute_batch("RELEASE structural_op")
                .map_err(|e| StatementError::from_sqlite(object, e)),
            Err(err) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK TO structural_op; RELEASE structural_op") {
                    warn!(operation = %op, error = %rollback, "savepoint rollback failed");
                }
                Err(err)
            }
        }
    }

    fn dispatch(&self, op: &StructuralOperation, conn: &Connection) -> Result<(), StatementError> {
        match op {
            StructuralOperation::CreateTableIfAbsent(schema) => create_table(schema, conn),
            StructuralOperation::CreateIndexIfAbsent(spec) => create_index(spec, conn),
            StructuralOperation::AddColumnIfAbsent { table, column } => {
                let sql_err = |e| StatementError::from_sqlite(table, e);
                if !table_exists(conn, table).map_err(sql_err)? {
                    return Err(StatementError::structural(
                        table,
                        format!("cannot add column {}: table does not exist", column.name),
                    ));
                }
                let existing = table_columns(conn, table).map_err(sql_err)?;
                if let Some(found) = existing.iter().find(|c| c.name == column.name) {
                    if !found.decl_type.eq_ignore_ascii_case(&column.column_type.to_string()) {
                        return Err(StatementError::structural(
                            table,
                            format!(
                                "column {} exists as {}, expected {}",
                                column.name, found.decl_type, column.column_type
                            ),
                        ));
                    }
                    debug!(table = %table, column = %column.name, "column already present");
                    return Ok(());
                }
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_ident(table),
                    column.sql()
                ))
                .map_err(sql_err)?;
                info!(table = %table, column = %column.name, "added column");
                Ok(())
            }
            StructuralOperation::RebuildTable(rebuild) => self.rebuild(rebuild, conn),
            StructuralOperation::CopyRows(copy) => copy_rows(copy, conn),
            StructuralOperation::DropTable(table) => {
                conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
                    .map_err(|e| StatementError::from_sqlite(table, e))?;
                info!(table = %table, "dropped table");
                Ok(())
            }
        }
    }

    fn rebuild(&self, rebuild: &RebuildTable, conn: &Connection) -> Result<(), StatementError> {
        let table = rebuild.table();
        let shadow = rebuild.shadow_name();
        let sql_err = |e| StatementError::from_sqlite(table, e);

        if foreign_keys_enabled(conn).map_err(sql_err)? {
            return Err(StatementError::structural(
                table,
                "foreign key enforcement must be off while a table is rebuilt",
            ));
        }

        let live = table_exists(conn, table).map_err(sql_err)?;
        let shadow_exists = table_exists(conn, &shadow).map_err(sql_err)?;

        if !live {
            if shadow_exists {
                // Interrupted between drop and rename: the shadow holds every row
                info!(table, "completing interrupted rebuild");
                rename(conn, &shadow, table)?;
                return Ok(());
            }
            return Err(StatementError::structural(table, "table to rebuild does not exist"));
        }
        if !shadow_exists && has_shape(conn, &rebuild.schema).map_err(sql_err)? {
            debug!(table, "table already has its rebuilt shape");
            return Ok(());
        }
        if shadow_exists {
            warn!(table, shadow = %shadow, "discarding leftover shadow table");
            conn.execute_batch(&format!("DROP TABLE {}", quote_ident(&shadow)))
                .map_err(sql_err)?;
        }

        let orphans_before = orphans_touching(conn, table).map_err(sql_err)?;

        conn.execute_batch(&rebuild.schema.create_sql_as(&shadow))
            .map_err(sql_err)?;
        self.checkpoint(RebuildStage::ShadowCreated, table)?;

        let copied = copy_through_mapping(conn, rebuild, &shadow)?;
        self.checkpoint(RebuildStage::RowsCopied, table)?;

        conn.execute_batch(&format!("DROP TABLE {}", quote_ident(table)))
            .map_err(sql_err)?;
        self.checkpoint(RebuildStage::OriginalDropped, table)?;

        rename(conn, &shadow, table)?;
        self.checkpoint(RebuildStage::Renamed, table)?;

        let orphans_after = orphans_touching(conn, table).map_err(sql_err)?;
        if orphans_after > orphans_before {
            return Err(StatementError::structural(
                table,
                format!(
                    "rebuild left {} new rows violating foreign keys",
                    orphans_after - orphans_before
                ),
            ));
        }

        info!(table, rows = copied, "rebuilt table");
        Ok(())
    }

    fn checkpoint(&self, stage: RebuildStage, table: &str) -> Result<(), StatementError> {
        debug!(table, %stage, "rebuild stage complete");
        #[cfg(test)]
        if self.fault_after == Some(stage) {
            return Err(StatementError::structural(
                table,
                format!("injected fault after {stage}"),
            ));
        }
        Ok(())
    }
}

/// Turns FK enforcement off for the duration of one operation on a bare connection.
///
/// Inside a transaction the pragma is a no-op, so the caller has to have done it already.
struct ForeignKeySuspension<'c> {
    conn: &'c Connection,
    restore: bool,
}

impl<'c> ForeignKeySuspension<'c> {
    fn begin(conn: &'c Connection, object: &str) -> Result<Self, StatementError> {
        let sql_err = |e| StatementError::from_sqlite(object, e);
        let restore = conn.is_autocommit() && foreign_keys_enabled(conn).map_err(sql_err)?;
        if restore {
            conn.pragma_update(None, "foreign_keys", false)
                .map_err(sql_err)?;
        }
        Ok(Self { conn, restore })
    }
}

impl Drop for ForeignKeySuspension<'_> {
    fn drop(&mut self) {
        if self.restore
            && let Err(e) = self.conn.pragma_update(None, "foreign_keys", true)
        {
            warn!(error = %e, "failed to re-enable foreign keys");
        }
    }
}

fn create_table(schema: &TableSchema, conn: &Connection) -> Result<(), StatementError> {
    let sql_err = |e| StatementError::from_sqlite(&schema.name, e);
    if table_exists(conn, &schema.name).map_err(sql_err)? {
        let existing = table_columns(conn, &schema.name).map_err(sql_err)?;
        for column in &schema.columns {
            let compatible = existing.iter().any(|c| {
                c.name == column.name && c.decl_type.eq_ignore_ascii_case(&column.column_type.to_string())
            });
            if !compatible {
                return Err(StatementError::structural(
                    &schema.name,
                    format!(
                        "table exists with an incompatible shape (column {} {})",
                        column.name, column.column_type
                    ),
                ));
            }
        }
        debug!(table = %schema.name, "table already present");
        return Ok(());
    }
    conn.execute_batch(&schema.create_sql()).map_err(sql_err)?;
    info!(table = %schema.name, "created table");
    Ok(())
}

fn create_index(spec: &IndexSpec, conn: &Connection) -> Result<(), StatementError> {
    let sql_err = |e| StatementError::from_sqlite(&spec.name, e);
    if let Some(found) = index_table(conn, &spec.name).map_err(sql_err)? {
        if found != spec.table {
            return Err(StatementError::structural(
                &spec.name,
                format!("index exists on {found}, expected {}", spec.table),
            ));
        }
        let columns = index_columns(conn, &spec.name).map_err(sql_err)?;
        if columns != spec.columns {
            return Err(StatementError::structural(
                &spec.name,
                format!("index exists over ({}), expected ({})", columns.join(", "), spec.columns.join(", ")),
            ));
        }
        return Ok(());
    }
    conn.execute_batch(&spec.create_sql()).map_err(sql_err)?;
    debug!(index = %spec.name, table = %spec.table, "created index");
    Ok(())
}

fn copy_rows(copy: &CopyRows, conn: &Connection) -> Result<(), StatementError> {
    let sql_err = |e| StatementError::from_sqlite(&copy.target, e);
    if !table_exists(conn, &copy.source).map_err(sql_err)? {
        debug!(source = %copy.source, "copy source gone, nothing to copy");
        return Ok(());
    }
    if let Some(ref column) = copy.only_if_column
        && !column_exists(conn, &copy.source, column).map_err(sql_err)?
    {
        debug!(source = %copy.source, column = %column, "copy guard column gone, nothing to copy");
        return Ok(());
    }
    let rows = conn.execute(&copy.sql(), []).map_err(sql_err)?;
    info!(source = %copy.source, target = %copy.target, rows, "copied rows");
    Ok(())
}

/// Foreign key violations where `table` is the child or the parent
fn orphans_touching(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    Ok(foreign_key_violations(conn)?
        .iter()
        .filter(|(child, _, parent)| child == table || parent == table)
        .count())
}

fn rename(conn: &Connection, from: &str, to: &str) -> Result<(), StatementError> {
    conn.execute_batch(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(from),
        quote_ident(to)
    ))
    .map_err(|e| StatementError::from_sqlite(to, e))
}

/// Whether the live table already has exactly this column list
fn has_shape(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<bool> {
    let live = table_columns(conn, &schema.name)?;
    Ok(live.len() == schema.columns.len()
        && live.iter().zip(&schema.columns).all(|(l, d)| {
            l.name == d.name
                && l.decl_type.eq_ignore_ascii_case(&d.column_type.to_string())
                && l.not_null == d.not_null
        }))
}

/// Row-by-row copy from the live table into the shadow, applying transforms per column
fn copy_through_mapping(conn: &Connection, rebuild: &RebuildTable, shadow: &str) -> Result<usize, StatementError> {
    let table = rebuild.table();
    let sql_err = |e| StatementError::from_sqlite(table, e);

    let live_columns = table_columns(conn, table).map_err(sql_err)?;
    for mapping in &rebuild.mapping {
        let source = mapping.source.source_column();
        if !live_columns.iter().any(|c| c.name == source) {
            return Err(StatementError::structural(
                table,
                format!("mapping reads column {source}, which the table does not have"),
            ));
        }
    }
    if rebuild.mapping.is_empty() {
        return Ok(0);
    }

    let sources: Vec<String> = rebuild
        .mapping
        .iter()
        .map(|m| quote_ident(m.source.source_column()))
        .collect();
    let targets: Vec<String> = rebuild.mapping.iter().map(|m| quote_ident(&m.target)).collect();
    let placeholders: Vec<String> = (1..=rebuild.mapping.len()).map(|i| format!("?{i}")).collect();

    let mut select = conn
        .prepare(&format!(
            "SELECT rowid, {} FROM {} ORDER BY rowid",
            sources.join(", "),
            quote_ident(table)
        ))
        .map_err(sql_err)?;
    let mut insert = conn
        .prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(shadow),
            targets.join(", "),
            placeholders.join(", ")
        ))
        .map_err(sql_err)?;

    let mut rows = select.query([]).map_err(sql_err)?;
    let mut copied = 0;
    while let Some(row) = rows.next().map_err(sql_err)? {
        let rowid: i64 = row.get(0).map_err(sql_err)?;
        let mut values = Vec::with_capacity(rebuild.mapping.len());
        for (i, mapping) in rebuild.mapping.iter().enumerate() {
            let raw: Value = row.get(i + 1).map_err(sql_err)?;
            let value = match mapping.source {
                ColumnSource::Copy(_) => raw,
                ColumnSource::Transform { ref transform, .. } => {
                    transform.apply(&raw).map_err(|reason| StatementError::DataTransform {
                        table: table.to_string(),
                        column: mapping.target.clone(),
                        row: rowid,
                        reason,
                    })?
                }
            };
            values.push(value);
        }
        insert
            .execute(rusqlite::params_from_iter(values))
            .map_err(sql_err)?;
        copied += 1;
    }
    Ok(copied)
}
