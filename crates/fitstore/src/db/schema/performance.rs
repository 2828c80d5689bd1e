// crates/fitstore/src/db/schema/performance.rs
// Composite lookup indices kept on top of the declared schema

use crate::db::migration::IndexSpec;

/// Recreated by the bootstrapper whenever they are missing; never required by verification
pub fn performance_indices() -> Vec<IndexSpec> {
    vec![
        IndexSpec::on("meal_entries", &["date", "mealType"]),
        IndexSpec::on("water_entries", &["date", "timestamp"]),
        IndexSpec::on("ai_logs", &["type", "ts"]),
        IndexSpec::on("weight_entries", &["recordedAt"]),
        IndexSpec::on("sync_operations", &["nextRetryAt"]),
    ]
}
