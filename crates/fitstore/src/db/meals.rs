// db/meals.rs
// Food items and meal log entries

use super::pool::StorePool;
use crate::error::{Result, StoreError};
use chrono::NaiveDate;
use fitstore_types::{FoodItem, MealEntry, MealSource};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use std::sync::Arc;

pub fn add_food_item_sync(conn: &Connection, item: &FoodItem) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO food_items (id, name, barcode, calories, carbs, protein, fat, createdAt)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            item.id,
            item.name,
            item.barcode,
            item.calories,
            item.carbs,
            item.protein,
            item.fat,
            item.created_at
        ],
    )?;
    Ok(())
}

/// (id, date, mealType, foodItemId, quantityGrams, recipeId, servings, notes, recordedAt)
fn parse_meal_row(row: &rusqlite::Row) -> rusqlite::Result<MealEntry> {
    let food: Option<String> = row.get(3)?;
    let recipe: Option<String> = row.get(5)?;
    let source = match (food, recipe) {
        (Some(food_item_id), _) => MealSource::Food {
            food_item_id,
            quantity_grams: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        },
        (None, Some(recipe_id)) => MealSource::Recipe {
            recipe_id,
            servings: row.get::<_, Option<f64>>(6)?.unwrap_or(1.0),
        },
        (None, None) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Null,
                "meal entry references neither a food item nor a recipe".into(),
            ));
        }
    };
    Ok(MealEntry {
        id: row.get(0)?,
        date: row.get(1)?,
        meal_type: row.get(2)?,
        source,
        notes: row.get(7)?,
        recorded_at: row.get(8)?,
    })
}

pub fn log_meal_sync(
    conn: &Connection,
    date: &str,
    meal_type: &str,
    source: &MealSource,
    notes: Option<&str>,
    recorded_at: i64,
) -> rusqlite::Result<i64> {
    match source {
        MealSource::Food {
            food_item_id,
            quantity_grams,
        } => conn.execute(
            "INSERT INTO meal_entries (foodItemId, date, mealType, quantityGrams, notes, recordedAt)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![food_item_id, date, meal_type, quantity_grams, notes, recorded_at],
        )?,
        MealSource::Recipe { recipe_id, servings } => conn.execute(
            "INSERT INTO meal_entries (recipeId, date, mealType, servings, notes, recordedAt)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![recipe_id, date, meal_type, servings, notes, recorded_at],
        )?,
    };
    Ok(conn.last_insert_rowid())
}

pub fn list_meals_for_date_sync(conn: &Connection, date: &str) -> rusqlite::Result<Vec<MealEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, mealType, foodItemId, quantityGrams, recipeId, servings, notes, recordedAt
         FROM meal_entries WHERE date = ?
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([date], parse_meal_row)?;
    rows.collect()
}

pub fn delete_meal_sync(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM meal_entries WHERE id = ?", [id])? > 0)
}

/// Row access to `food_items` and `meal_entries`
#[derive(Clone)]
pub struct MealStore {
    pool: Arc<StorePool>,
}

impl MealStore {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    pub async fn add_food_item(&self, item: FoodItem) -> Result<()> {
        self.pool.run_with_retry(move |conn| add_food_item_sync(conn, &item)).await
    }

    pub async fn log_food(&self, date: NaiveDate, meal_type: &str, food_item_id: &str, quantity_grams: f64) -> Result<i64> {
        if quantity_grams <= 0.0 {
            return Err(StoreError::InvalidInput("quantity must be positive".into()));
        }
        let source = MealSource::Food {
            food_item_id: food_item_id.to_string(),
            quantity_grams,
        };
        self.log(date, meal_type, source).await
    }

    pub async fn log_recipe(&self, date: NaiveDate, meal_type: &str, recipe_id: &str, servings: f64) -> Result<i64> {
        if servings <= 0.0 {
            return Err(StoreError::InvalidInput("servings must be positive".into()));
        }
        let source = MealSource::Recipe {
            recipe_id: recipe_id.to_string(),
            servings,
        };
        self.log(date, meal_type, source).await
    }

    async fn log(&self, date: NaiveDate, meal_type: &str, source: MealSource) -> Result<i64> {
        let date = date.format("%Y-%m-%d").to_string();
        let meal_type = meal_type.to_string();
        let recorded_at = chrono::Utc::now().timestamp();
        self.pool
            .run_with_retry(move |conn| log_meal_sync(conn, &date, &meal_type, &source, None, recorded_at))
            .await
    }

    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<MealEntry>> {
        let date = date.format("%Y-%m-%d").to_string();
        self.pool.run(move |conn| list_meals_for_date_sync(conn, &date)).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.pool.run_with_retry(move |conn| delete_meal_sync(conn, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_store;
    use fitstore_types::Recipe;

    fn oats() -> FoodItem {
        FoodItem {
            id: "f1".into(),
            name: "Oats".into(),
            barcode: None,
            calories: 389,
            carbs: 66.3,
            protein: 16.9,
            fat: 6.9,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_food_and_recipe_entries() {
        let (_dir, store) = setup_test_store().await;
        let meals = store.meals();
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        meals.add_food_item(oats()).await.unwrap();
        store.recipes().upsert(Recipe::new("r1", "Soup", "", 1)).await.unwrap();

        meals.log_food(day, "breakfast", "f1", 80.0).await.unwrap();
        meals.log_recipe(day, "dinner", "r1", 1.5).await.unwrap();

        let entries = meals.for_date(day).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.recorded_at.is_some()));
        assert_eq!(
            entries[0].source,
            MealSource::Food {
                food_item_id: "f1".into(),
                quantity_grams: 80.0
            }
        );
        assert_eq!(
            entries[1].source,
            MealSource::Recipe {
                recipe_id: "r1".into(),
                servings: 1.5
            }
        );

        // Removing the recipe removes the meal that references it
        store.recipes().delete("r1").await.unwrap();
        assert_eq!(meals.for_date(day).await.unwrap().len(), 1);
        assert!(meals.delete(entries[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_food_item_is_rejected() {
        let (_dir, store) = setup_test_store().await;
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let err = store.meals().log_food(day, "lunch", "nope", 100.0).await.unwrap_err();
        assert!(matches!(err, StoreError::Db(_)));
    }
}
