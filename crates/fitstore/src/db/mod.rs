// crates/fitstore/src/db/mod.rs
// Persistent store: migration engine, fitness schema, pooled handle and row accessors

pub mod inspect;
pub mod meals;
pub mod migration;
pub mod migration_helpers;
pub mod opener;
pub mod pool;
pub mod recipes;
pub mod schema;
pub mod streaks;
pub mod sync_operations;
pub mod weights;

#[cfg(test)]
pub mod test_support;

pub use meals::MealStore;
pub use pool::StorePool;
pub use recipes::RecipeStore;
pub use streaks::StreakStore;
pub use sync_operations::{SyncQueue, SyncStatus};
pub use weights::WeightStore;
