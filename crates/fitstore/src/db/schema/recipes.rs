// crates/fitstore/src/db/schema/recipes.rs
// Recipe consolidation at version 16
//
// Favourites move off the recipe row into `recipe_favorites`, `recipes` is
// rebuilt into its enhanced shape, and the legacy `saved_recipes` table is
// folded into it and the new detail tables, then dropped. Order matters:
// favourites are read from `isFavorite` before the rebuild removes that column.

use crate::db::migration::{
    ColumnDef, CopyRows, IndexSpec, MigrationStep, OnDelete, RebuildTable, StructuralOperation,
    TableSchema,
};

/// `recipes` from version 16 on
pub fn recipes_v16() -> TableSchema {
    TableSchema::new("recipes")
        .text_nn("id")
        .text_nn("title")
        .text("description")
        .text_nn("markdown")
        .text("imageUrl")
        .int("prepTime")
        .int("cookTime")
        .int("servings")
        .text("difficulty")
        .text("categories")
        .int("calories")
        .real("protein")
        .real("carbs")
        .real("fat")
        .real("fiber")
        .real("sugar")
        .real("sodium")
        .int_nn("createdAt")
        .column(ColumnDef::integer("isOfficial").not_null().default_value("0"))
        .column(ColumnDef::real("rating").not_null().default_value("0"))
        .column(ColumnDef::integer("ratingCount").not_null().default_value("0"))
        .column(ColumnDef::integer("isLocalOnly").not_null().default_value("1"))
        .primary_key(&["id"])
}

/// 15 -> 16
pub fn recipe_consolidation() -> MigrationStep {
    MigrationStep::new(15, 16, "recipe favourites split, saved recipes merged, recipe collections")
        .op(TableSchema::new("recipe_favorites")
            .text_nn("recipeId")
            .int_nn("savedAt")
            .primary_key(&["recipeId"])
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade))
        .op(IndexSpec::on("recipe_favorites", &["recipeId"]))
        .op(CopyRows::new("recipes", "recipe_favorites")
            .column("recipeId", "\"id\"")
            .column("savedAt", "\"createdAt\"")
            .filter("\"isFavorite\" = 1")
            .only_if_column("isFavorite"))
        .op(RebuildTable::new(recipes_v16()).copy(&[
            "id",
            "title",
            "markdown",
            "calories",
            "imageUrl",
            "createdAt",
        ]))
        .ops(recipe_details())
        .ops(saved_recipes_merge())
        .ops([
            IndexSpec::on("recipes", &["createdAt"]),
            IndexSpec::on("recipes", &["calories"]),
            IndexSpec::on("recipes", &["title"]),
        ])
}

/// Every column of `saved_recipes` lands somewhere before the table goes:
/// tags become categories, the ingredient list becomes ingredient rows and
/// the last cook time moves to the recipe's analytics.
fn saved_recipes_merge() -> Vec<StructuralOperation> {
    vec![
        CopyRows::new("saved_recipes", "recipes")
            .same(&[
                "id",
                "title",
                "markdown",
                "calories",
                "imageUrl",
                "prepTime",
                "difficulty",
                "servings",
                "createdAt",
            ])
            .column("categories", "\"tags\"")
            .into(),
        CopyRows::new("saved_recipes", "recipe_favorites")
            .column("recipeId", "\"id\"")
            .column("savedAt", "\"createdAt\"")
            .filter("\"isFavorite\" = 1")
            .into(),
        CopyRows::new("saved_recipes", "recipe_ingredients")
            .column("recipeId", "\"saved_recipes\".\"id\"")
            .column("name", "\"element\".\"value\"")
            .column("position", "\"element\".\"key\"")
            .each_element_of("ingredients")
            .into(),
        // Free text that is not a JSON array is kept whole as a single ingredient
        CopyRows::new("saved_recipes", "recipe_ingredients")
            .column("recipeId", "\"id\"")
            .column("name", "\"ingredients\"")
            .column("position", "0")
            .filter(
                "\"ingredients\" <> '' AND CASE WHEN json_valid(\"ingredients\") \
                 THEN json_type(\"ingredients\") <> 'array' ELSE 1 END",
            )
            .into(),
        CopyRows::new("saved_recipes", "recipe_analytics")
            .column("recipeId", "\"id\"")
            .column("lastCooked", "\"lastCookedAt\"")
            .filter("\"lastCookedAt\" IS NOT NULL")
            .into(),
        StructuralOperation::drop_table("saved_recipes"),
    ]
}

/// Detail tables hanging off a recipe, plus saved meals and PRO feature state
fn recipe_details() -> Vec<StructuralOperation> {
    vec![
        TableSchema::new("recipe_ingredients")
            .autoincrement_id("id")
            .text_nn("recipeId")
            .text_nn("name")
            .real("quantity")
            .text("unit")
            .int_nn("position")
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("recipe_ingredients", &["recipeId"]).into(),
        IndexSpec::on("recipe_ingredients", &["recipeId", "position"]).unique().into(),
        TableSchema::new("recipe_steps")
            .autoincrement_id("id")
            .text_nn("recipeId")
            .int_nn("stepIndex")
            .text_nn("instruction")
            .int("durationMinutes")
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("recipe_steps", &["recipeId"]).into(),
        TableSchema::new("grocery_lists")
            .autoincrement_id("id")
            .text_nn("name")
            .column(ColumnDef::integer("isCompleted").not_null().default_value("0"))
            .int_nn("createdAt")
            .into(),
        TableSchema::new("grocery_items")
            .autoincrement_id("id")
            .int_nn("listId")
            .text_nn("name")
            .text("quantity")
            .text("unit")
            .text("category")
            .column(ColumnDef::integer("isChecked").not_null().default_value("0"))
            .text("fromRecipeId")
            .foreign_key("listId", "grocery_lists", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("grocery_items", &["listId"]).into(),
        TableSchema::new("recipe_collections")
            .autoincrement_id("id")
            .text_nn("name")
            .text("description")
            .int_nn("createdAt")
            .into(),
        TableSchema::new("recipe_collection_items")
            .int_nn("collectionId")
            .text_nn("recipeId")
            .int_nn("addedAt")
            .primary_key(&["collectionId", "recipeId"])
            .foreign_key("collectionId", "recipe_collections", "id", OnDelete::Cascade)
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("recipe_collection_items", &["recipeId"]).into(),
            TableSchema::new("recipe_analytics")
            .text_nn("recipeId")
            .column(ColumnDef::integer("viewCount").not_null().default_value("0"))
            .column(ColumnDef::integer("cookingStartedCount").not_null().default_value("0"))
            .column(ColumnDef::integer("cookingCompletedCount").not_null().default_value("0"))
            .column(ColumnDef::integer("favoritedCount").not_null().default_value("0"))
            .column(ColumnDef::integer("groceryListAdditions").not_null().default_value("0"))
            .column(ColumnDef::real("averageRating").not_null().default_value("0"))
            .column(ColumnDef::real("completionRate").not_null().default_value("0"))
            .int("lastViewed")
            .int("lastCooked")
            .primary_key(&["recipeId"])
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        TableSchema::new("recipe_ratings")
            .autoincrement_id("id")
            .text_nn("recipeId")
            .real_nn("rating")
            .text("review")
            .int_nn("createdAt")
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("recipe_ratings", &["recipeId"]).into(),
        TableSchema::new("meals")
            .text_nn("id")
            .text_nn("name")
            .text("description")
            .text_nn("mealType")
            .text_nn("foods")
            .int_nn("totalCalories")
            .real_nn("totalProtein")
            .real_nn("totalCarbs")
            .real_nn("totalFat")
            .int_nn("createdAt")
            .int("lastUsedAt")
            .primary_key(&["id"])
            .into(),
        IndexSpec::on("meals", &["mealType"]).into(),
        TableSchema::new("pro_features")
            .text_nn("featureName")
            .text_nn("displayName")
            .text_nn("description")
            .column(ColumnDef::integer("isUnlocked").not_null().default_value("0"))
            .int("unlockedAt")
            .column(ColumnDef::integer("usageCount").not_null().default_value("0"))
            .int("maxUsage")
            .text_nn("category")
            .primary_key(&["featureName"])
            .into(),
    ]
}
