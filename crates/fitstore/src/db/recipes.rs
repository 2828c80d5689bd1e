// db/recipes.rs
// Recipe rows and favourites

use super::pool::StorePool;
use crate::error::{Result, StoreError};
use fitstore_types::Recipe;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;

const RECIPE_COLUMNS: &str = "id, title, description, markdown, imageUrl, prepTime, cookTime, servings, \
     difficulty, categories, calories, protein, carbs, fat, fiber, sugar, sodium, createdAt, isOfficial, \
     rating, ratingCount, isLocalOnly";

/// Parse Recipe from a row in `RECIPE_COLUMNS` order
pub fn parse_recipe_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        markdown: row.get(3)?,
        image_url: row.get(4)?,
        prep_time: row.get(5)?,
        cook_time: row.get(6)?,
        servings: row.get(7)?,
        difficulty: row.get(8)?,
        categories: row.get(9)?,
        calories: row.get(10)?,
        protein: row.get(11)?,
        carbs: row.get(12)?,
        fat: row.get(13)?,
        fiber: row.get(14)?,
        sugar: row.get(15)?,
        sodium: row.get(16)?,
        created_at: row.get(17)?,
        is_official: row.get::<_, i64>(18)? != 0,
        rating: row.get(19)?,
        rating_count: row.get(20)?,
        is_local_only: row.get::<_, i64>(21)? != 0,
    })
}

/// Insert or replace every column of a recipe
pub fn upsert_recipe_sync(conn: &Connection, recipe: &Recipe) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO recipes ({RECIPE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                     ?20, ?21, ?22)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title, description = excluded.description,
                markdown = excluded.markdown, imageUrl = excluded.imageUrl,
                prepTime = excluded.prepTime, cookTime = excluded.cookTime,
                servings = excluded.servings, difficulty = excluded.difficulty,
                categories = excluded.categories, calories = excluded.calories,
                protein = excluded.protein, carbs = excluded.carbs, fat = excluded.fat,
                fiber = excluded.fiber, sugar = excluded.sugar, sodium = excluded.sodium,
                isOfficial = excluded.isOfficial, rating = excluded.rating,
                ratingCount = excluded.ratingCount, isLocalOnly = excluded.isLocalOnly"
        ),
        params![
            recipe.id,
            recipe.title,
            recipe.description,
            recipe.markdown,
            recipe.image_url,
            recipe.prep_time,
            recipe.cook_time,
            recipe.servings,
            recipe.difficulty,
            recipe.categories,
            recipe.calories,
            recipe.protein,
            recipe.carbs,
            recipe.fat,
            recipe.fiber,
            recipe.sugar,
            recipe.sodium,
            recipe.created_at,
            recipe.is_official,
            recipe.rating,
            recipe.rating_count,
            recipe.is_local_only,
        ],
    )?;
    Ok(())
}

pub fn get_recipe_sync(conn: &Connection, id: &str) -> rusqlite::Result<Option<Recipe>> {
    conn.query_row(
        &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?"),
        [id],
        parse_recipe_row,
    )
    .optional()
}

/// Newest first
pub fn list_recent_recipes_sync(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Recipe>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY createdAt DESC, id ASC LIMIT ?"
    ))?;
    let rows = stmt.query_map([limit as i64], parse_recipe_row)?;
    rows.collect()
}

/// Returns whether a row was deleted. Favourites, ingredients and meal entries cascade.
pub fn delete_recipe_sync(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM recipes WHERE id = ?", [id])? > 0)
}

pub fn mark_favorite_sync(conn: &Connection, recipe_id: &str, saved_at: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO recipe_favorites (recipeId, savedAt) VALUES (?, ?)",
        params![recipe_id, saved_at],
    )?;
    Ok(())
}

pub fn unmark_favorite_sync(conn: &Connection, recipe_id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM recipe_favorites WHERE recipeId = ?", [recipe_id])? > 0)
}

/// Favourites, most recently saved first
pub fn list_favorites_sync(conn: &Connection) -> rusqlite::Result<Vec<Recipe>> {
    let columns = RECIPE_COLUMNS
        .split(", ")
        .map(|c| format!("r.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM recipes r
         JOIN recipe_favorites f ON f.recipeId = r.id
         ORDER BY f.savedAt DESC, r.id ASC"
    ))?;
    let rows = stmt.query_map([], parse_recipe_row)?;
    rows.collect()
}

/// Row access to `recipes` and `recipe_favorites`
#[derive(Clone)]
pub struct RecipeStore {
    pool: Arc<StorePool>,
}

impl RecipeStore {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, recipe: Recipe) -> Result<()> {
        if recipe.id.trim().is_empty() {
            return Err(StoreError::InvalidInput("recipe id must not be empty".into()));
        }
        self.pool
            .run_with_retry(move |conn| upsert_recipe_sync(conn, &recipe))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Recipe>> {
        let id = id.to_string();
        self.pool.run(move |conn| get_recipe_sync(conn, &id)).await
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Recipe>> {
        self.pool.run(move |conn| list_recent_recipes_sync(conn, limit)).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.pool.run_with_retry(move |conn| delete_recipe_sync(conn, &id)).await
    }

    pub async fn mark_favorite(&self, recipe_id: &str) -> Result<()> {
        let recipe_id = recipe_id.to_string();
        let saved_at = chrono::Utc::now().timestamp();
        self.pool
            .run_with_retry(move |conn| {
                if get_recipe_sync(conn, &recipe_id)?.is_none() {
                    return Err(StoreError::NotFound(format!("recipe {recipe_id}")));
                }
                mark_favorite_sync(conn, &recipe_id, saved_at)?;
                Ok(())
            })
            .await
    }

    pub async fn unmark_favorite(&self, recipe_id: &str) -> Result<bool> {
        let recipe_id = recipe_id.to_string();
        self.pool
            .run_with_retry(move |conn| unmark_favorite_sync(conn, &recipe_id))
            .await
    }

    pub async fn list_favorites(&self) -> Result<Vec<Recipe>> {
        self.pool.run(list_favorites_sync).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_store;

    fn soup() -> Recipe {
        Recipe {
            calories: Some(300),
            categories: Some(r#"["dinner"]"#.to_string()),
            fiber: Some(2.5),
            rating: 4.5,
            rating_count: 2,
            ..Recipe::new("r1", "Soup", "# Soup", 1_700_000_000)
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_dir, store) = setup_test_store().await;
        let recipes = store.recipes();

        recipes.upsert(soup()).await.unwrap();
        assert_eq!(recipes.get("r1").await.unwrap(), Some(soup()));

        let mut renamed = soup();
        renamed.title = "Tomato Soup".to_string();
        recipes.upsert(renamed.clone()).await.unwrap();
        assert_eq!(recipes.get("r1").await.unwrap(), Some(renamed));
        assert_eq!(recipes.list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let (_dir, store) = setup_test_store().await;
        let err = store.recipes().upsert(Recipe::new(" ", "x", "", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_favourites_follow_recipe_lifecycle() {
        let (_dir, store) = setup_test_store().await;
        let recipes = store.recipes();
        recipes.upsert(soup()).await.unwrap();
        recipes.upsert(Recipe::new("r2", "Salad", "", 1_700_000_100)).await.unwrap();

        recipes.mark_favorite("r1").await.unwrap();
        recipes.mark_favorite("r1").await.unwrap();
        let favourites = recipes.list_favorites().await.unwrap();
        assert_eq!(favourites.len(), 1);
        assert_eq!(favourites[0].id, "r1");

        let err = recipes.mark_favorite("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        // Deleting the recipe cascades to its favourite
        assert!(recipes.delete("r1").await.unwrap());
        assert!(recipes.list_favorites().await.unwrap().is_empty());
        assert!(!recipes.unmark_favorite("r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let (_dir, store) = setup_test_store().await;
        let recipes = store.recipes();
        recipes.upsert(Recipe::new("old", "Old", "", 100)).await.unwrap();
        recipes.upsert(Recipe::new("new", "New", "", 200)).await.unwrap();

        let listed = recipes.list_recent(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "new");
    }
}
