// crates/fitstore/src/db/migration/error.rs
// Error taxonomy of the migration engine

use thiserror::Error;

/// The declared chain is inconsistent; surfaced when the catalog is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainConfigurationError {
    #[error("first step starts at version {first_from}, but the baseline is version {baseline}")]
    StartMismatch { baseline: u32, first_from: u32 },

    #[error("gap in migration chain: expected a step from version {expected_from}, found {found_from}")]
    Gap { expected_from: u32, found_from: u32 },

    #[error("duplicate migration step from version {0}")]
    DuplicateFrom(u32),

    #[error("step {from}->{to} must advance exactly one version")]
    NonAdjacent { from: u32, to: u32 },

    #[error("invalid operation '{operation}' at version {version}: {reason}")]
    InvalidOperation {
        version: u32,
        operation: String,
        reason: String,
    },

    #[error("step to version {version} drops table {table} without copying its rows first")]
    UnsafeDrop { version: u32, table: String },

    #[error("step to version {version} drops {table}.{column}, which no earlier copy in the step reads")]
    UncopiedColumn {
        version: u32,
        table: String,
        column: String,
    },
}

/// Failure of a single structural operation
#[derive(Error, Debug)]
pub enum StatementError {
    /// Schema conflict, e.g. a table that already exists with an incompatible shape
    #[error("structural conflict on {object}: {message}")]
    Structural { object: String, message: String },

    /// A row could not be converted during a rebuild
    #[error("row {row} of {table} failed to transform into column {column}: {reason}")]
    DataTransform {
        table: String,
        column: String,
        row: i64,
        reason: String,
    },

    /// Connection or storage fault (busy, locked, disk full, timeout)
    #[error("I/O failure: {0}")]
    IoFailure(#[source] rusqlite::Error),
}

impl StatementError {
    pub fn structural(object: impl Into<String>, message: impl Into<String>) -> Self {
        StatementError::Structural {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Classify an engine error raised while working on `object`
    pub fn from_sqlite(object: &str, err: rusqlite::Error) -> Self {
        if is_io_class(&err) {
            StatementError::IoFailure(err)
        } else {
            StatementError::structural(object, err.to_string())
        }
    }

    /// Only I/O-class failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatementError::IoFailure(_))
    }
}

/// Busy, locked, timed out, or a storage fault
pub(crate) fn is_io_class(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi::ErrorCode;
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => matches!(
            inner.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::CannotOpen
                | ErrorCode::FileLockingProtocolFailed
                | ErrorCode::OperationInterrupted
        ),
        _ => false,
    }
}

/// Failure of a migration pass
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("step {from}->{to} failed: {source}")]
    Step {
        from: u32,
        to: u32,
        #[source]
        source: StatementError,
    },

    #[error("cannot downgrade store from version {current} to {target}")]
    Downgrade { current: u32, target: u32 },

    #[error("store version {current} predates the oldest supported schema version {baseline}")]
    BelowBaseline { current: u32, baseline: u32 },

    #[error("no migration path from version {current} to {target}: no step declared from version {missing_from}")]
    NonContiguousChain {
        current: u32,
        target: u32,
        missing_from: u32,
    },

    #[error("no schema is declared for version {0}")]
    UnknownVersion(u32),

    #[error("step {from}->{to} committed but the store reports version {found}")]
    VersionMismatch { from: u32, to: u32, found: u32 },

    #[error("migration cancelled at version {at_version}")]
    Cancelled { at_version: u32 },

    #[error("failed to read schema version: {0}")]
    ReadVersion(#[source] rusqlite::Error),

    #[error("migration cannot complete from version {at_version}, destructive recreate requested: {cause}")]
    RecreateRequested {
        at_version: u32,
        cause: Box<MigrationError>,
    },
}

impl MigrationError {
    /// Whether destructive recreation may stand in for this failure.
    ///
    /// Downgrades and cancellations are never answered by discarding data.
    pub fn allows_fallback(&self) -> bool {
        !matches!(
            self,
            MigrationError::Downgrade { .. }
                | MigrationError::Cancelled { .. }
                | MigrationError::RecreateRequested { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_is_io_failure() {
        let err = StatementError::from_sqlite("recipes", sqlite_failure(ffi::SQLITE_BUSY));
        assert!(err.is_retryable());
        let err = StatementError::from_sqlite("recipes", sqlite_failure(ffi::SQLITE_FULL));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_is_structural() {
        let err = StatementError::from_sqlite("recipes", sqlite_failure(ffi::SQLITE_CONSTRAINT));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("structural conflict on recipes"));
    }

    #[test]
    fn test_fallback_eligibility() {
        let gap = MigrationError::NonContiguousChain {
            current: 7,
            target: 9,
            missing_from: 8,
        };
        assert!(gap.allows_fallback());
        assert!(!MigrationError::Downgrade { current: 9, target: 7 }.allows_fallback());
        assert!(!MigrationError::Cancelled { at_version: 8 }.allows_fallback());
    }

    #[test]
    fn test_step_error_message() {
        let err = MigrationError::Step {
            from: 6,
            to: 7,
            source: StatementError::DataTransform {
                table: "personal_streaks".into(),
                column: "lastActivityTimestamp".into(),
                row: 3,
                reason: "unparsable date \"soon\"".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("step 6->7"));
        assert!(text.contains("row 3 of personal_streaks"));
    }
}
