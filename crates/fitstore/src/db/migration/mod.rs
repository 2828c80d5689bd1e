// crates/fitstore/src/db/migration/mod.rs
// Versioned schema migration engine

pub mod bootstrap;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod model;
pub mod operation;
pub mod runner;
pub mod transform;
pub mod verifier;

pub use bootstrap::ensure_indices;
pub use catalog::{Baseline, MigrationStep, SchemaCatalog};
pub use error::{ChainConfigurationError, MigrationError, StatementError};
pub use executor::{RebuildStage, StatementExecutor};
pub use model::SchemaModel;
pub use operation::{
    ColumnDef, ColumnType, CopyRows, IndexSpec, OnDelete, RebuildTable, RowTransform,
    StructuralOperation, TableSchema,
};
pub use runner::{CancelFlag, MigrationRunner};
pub use verifier::{ExpectationSet, ExpectationViolation, VerificationReport, verify};
