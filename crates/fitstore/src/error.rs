// crates/fitstore/src/error.rs
// Crate-level error types for fitstore

use crate::db::migration::ExpectationViolation;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store access after the store is open
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task cancelled")]
    Cancelled,

    #[error(transparent)]
    Open(#[from] FatalOpenError),

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<String> for StoreError {
    fn from(s: String) -> Self {
        StoreError::Other(s)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            StoreError::Cancelled
        } else {
            StoreError::Other(err.to_string())
        }
    }
}

/// Why the store could not be brought to a usable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalOpenKind {
    #[strum(to_string = "store file could not be opened")]
    Unopenable,
    #[strum(to_string = "store is locked by another connection")]
    Busy,
    #[strum(to_string = "schema chain is misconfigured")]
    ChainConfiguration,
    #[strum(to_string = "migration failed")]
    Migration,
    #[strum(to_string = "integrity verification failed")]
    Verification,
    #[strum(to_string = "destructive recreate failed")]
    Recreate,
}

/// Terminal failure of the store opener ("database unavailable").
///
/// Carries enough context for a one-paragraph diagnostic: the last version the
/// store is known to be at and the first unmet expectation, if any.
#[derive(Error, Debug)]
#[error("database unavailable at {}: {kind}: {message}", path.display())]
pub struct FatalOpenError {
    pub path: PathBuf,
    pub kind: FatalOpenKind,
    pub message: String,
    pub last_version: Option<u32>,
    pub first_violation: Option<ExpectationViolation>,
}

impl FatalOpenError {
    pub fn new(path: impl Into<PathBuf>, kind: FatalOpenKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
            last_version: None,
            first_violation: None,
        }
    }

    pub fn at_version(mut self, version: Option<u32>) -> Self {
        self.last_version = version;
        self
    }

    pub fn with_violation(mut self, violation: Option<ExpectationViolation>) -> Self {
        self.first_violation = violation;
        self
    }

    /// Human-readable diagnostic for CLI and service wrappers
    pub fn diagnostic(&self) -> String {
        let mut out = format!(
            "database unavailable: {}\n  store: {}\n  cause: {}",
            self.kind,
            self.path.display(),
            self.message
        );
        match self.last_version {
            Some(v) => out.push_str(&format!("\n  last reached schema version: {v}")),
            None => out.push_str("\n  last reached schema version: unknown"),
        }
        if let Some(ref violation) = self.first_violation {
            out.push_str(&format!("\n  first violation: {violation}"));
        }
        out
    }

    /// Process exit code for wrappers (non-zero, distinct from usage errors)
    pub fn exit_code(&self) -> i32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // StoreError construction tests
    // ============================================================================

    #[test]
    fn test_invalid_input_error() {
        let err = StoreError::InvalidInput("negative weight".to_string());
        assert!(err.to_string().contains("invalid input"));
        assert!(err.to_string().contains("negative weight"));
    }

    #[test]
    fn test_not_found_error() {
        let err = StoreError::NotFound("recipe r9".to_string());
        assert_eq!(err.to_string(), "not found: recipe r9");
    }

    #[test]
    fn test_from_string() {
        let err: StoreError = "boom".to_string().into();
        assert!(matches!(err, StoreError::Other(_)));
    }

    #[test]
    fn test_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.to_string().starts_with("database error"));
    }

    // ============================================================================
    // FatalOpenError diagnostics
    // ============================================================================

    #[test]
    fn test_diagnostic_includes_version_and_violation() {
        let err = FatalOpenError::new("/tmp/fit.db", FatalOpenKind::Verification, "1 violation")
            .at_version(Some(12))
            .with_violation(Some(ExpectationViolation::MissingTable {
                table: "cooking_timers".to_string(),
            }));

        let text = err.diagnostic();
        assert!(text.contains("database unavailable"));
        assert!(text.contains("last reached schema version: 12"));
        assert!(text.contains("cooking_timers"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_diagnostic_unknown_version() {
        let err = FatalOpenError::new("/tmp/fit.db", FatalOpenKind::Unopenable, "not a database");
        assert!(err.diagnostic().contains("unknown"));
        assert!(err.to_string().contains("store file could not be opened"));
    }
}
