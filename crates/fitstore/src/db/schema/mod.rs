// crates/fitstore/src/db/schema/mod.rs
// Fitness app schema: baseline at version 5 and every step up to the current version

mod baseline;
mod cloud;
mod nutrition;
mod performance;
mod progress;
mod recipes;
mod social;
mod training;

pub use baseline::baseline;
pub use performance::performance_indices;
pub use recipes::recipes_v16;

use crate::db::migration::{ChainConfigurationError, MigrationStep, SchemaCatalog};

/// Oldest version a store may be upgraded from
pub const BASELINE_VERSION: u32 = 5;

/// Version the application expects
pub const CURRENT_SCHEMA_VERSION: u32 = 19;

/// Every step, in chain order
pub fn steps() -> Vec<MigrationStep> {
    vec![
        progress::personal_progress(),
        progress::streak_timestamps(),
        progress::weight_tracking(),
        nutrition::nutrition_tracking(),
        progress::body_tracking(),
        training::workout_analytics(),
        training::cooking_mode(),
        cloud::cloud_and_health(),
        social::social_challenges(),
        // Version bump only; data must come through untouched
        MigrationStep::new(14, 15, "no structural change"),
        recipes::recipe_consolidation(),
        nutrition::recipe_meals(),
        cloud::ai_usage(),
        cloud::offline_queue(),
    ]
}

/// The validated catalog for the fitness store
pub fn fitness_catalog() -> Result<SchemaCatalog, ChainConfigurationError> {
    Ok(SchemaCatalog::new(baseline(), steps())?.with_performance_indices(performance_indices()))
}
