// crates/fitstore-types/src/lib.rs
// Shared types for fitstore (rows, reports)
// No native-only dependencies allowed here

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════
// ROW TYPES
// ═══════════════════════════════════════

/// Recipe row as stored from schema version 16 onward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub markdown: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub prep_time: Option<i64>,
    #[serde(default)]
    pub cook_time: Option<i64>,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default)]
    pub difficulty: Option<String>,
    /// JSON list of category or tag names
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub calories: Option<i64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub fiber: Option<f64>,
    #[serde(default)]
    pub sugar: Option<f64>,
    /// Milligrams
    #[serde(default)]
    pub sodium: Option<f64>,
    pub created_at: i64,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: i64,
    #[serde(default = "default_local_only")]
    pub is_local_only: bool,
}

fn default_local_only() -> bool {
    true
}

impl Recipe {
    /// Minimal recipe with only the required fields populated
    pub fn new(id: impl Into<String>, title: impl Into<String>, markdown: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            markdown: markdown.into(),
            image_url: None,
            prep_time: None,
            cook_time: None,
            servings: None,
            difficulty: None,
            categories: None,
            calories: None,
            protein: None,
            carbs: None,
            fat: None,
            fiber: None,
            sugar: None,
            sodium: None,
            created_at,
            is_official: false,
            rating: 0.0,
            rating_count: 0,
            is_local_only: true,
        }
    }
}

/// Activity streak (timestamps are epoch seconds, UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalStreak {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_activity_timestamp: Option<i64>,
    pub is_active: bool,
    pub target_days: Option<i64>,
    pub created_at: i64,
}

/// Body weight measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: i64,
    pub weight: f64,
    pub date_iso: String,
    pub notes: Option<String>,
    pub recorded_at: i64,
}

/// Nutrition facts for one food, per 100 g
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub calories: i64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub created_at: i64,
}

/// What a meal entry refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MealSource {
    Food { food_item_id: String, quantity_grams: f64 },
    Recipe { recipe_id: String, servings: f64 },
}

/// Logged meal, either a food item or a recipe portion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: i64,
    pub date: String,
    pub meal_type: String,
    pub source: MealSource,
    pub notes: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<i64>,
}

/// Offline sync queue item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub operation_type: String,
    pub operation_data: String,
    pub timestamp: i64,
    pub retry_count: i64,
    pub max_retries: i64,
    pub status: String,
    pub priority: i64,
    pub error_message: Option<String>,
    pub last_attempt_at: Option<i64>,
    pub next_retry_at: Option<i64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

// ═══════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════

/// One index the bootstrapper could not create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFailure {
    pub index: String,
    pub error: String,
}

/// Outcome of one index bootstrap pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexBootstrapReport {
    /// Indices that did not exist and were created
    pub created: Vec<String>,
    /// Indices that were already in place
    pub present: Vec<String>,
    pub failed: Vec<IndexFailure>,
}

impl IndexBootstrapReport {
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.present.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read-only view of where a store stands relative to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub path: String,
    pub exists: bool,
    pub on_disk_version: u32,
    pub current_version: u32,
    pub pending_steps: u32,
    #[serde(default)]
    pub last_applied: Option<AppliedStep>,
}

/// Row from the schema history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedStep {
    pub version: u32,
    pub description: String,
    pub applied_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_source_tagged() {
        let source = MealSource::Recipe {
            recipe_id: "r1".to_string(),
            servings: 1.5,
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"kind\":\"recipe\""));
    }

    #[test]
    fn test_recipe_defaults_local_only() {
        let json = r#"{"id":"r1","title":"Soup","markdown":"","created_at":1}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert!(recipe.is_local_only);
        assert!(!recipe.is_official);
        assert_eq!(recipe, Recipe::new("r1", "Soup", "", 1));
    }

    #[test]
    fn test_bootstrap_report_counts() {
        let report = IndexBootstrapReport {
            created: vec!["a".into()],
            present: vec!["b".into(), "c".into()],
            failed: vec![IndexFailure {
                index: "d".into(),
                error: "no such table".into(),
            }],
        };
        assert_eq!(report.succeeded(), 3);
        assert!(!report.is_clean());
    }
}
