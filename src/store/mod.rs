mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Fields of a recipe's association line as supplied by a caller, before the
/// ingredient is resolved against the catalog.
#[derive(Debug, Clone)]
pub struct IngredientLine {
    pub ingredient_id: String,
    pub amount: i64,
}

/// Filters for recipe listing. `favorited_by` / `in_cart_of` restrict to
/// recipes present in that user's relation set.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub author_id: Option<String>,
    pub favorited_by: Option<String>,
    pub in_cart_of: Option<String>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;

    // Ingredient catalog (read-mostly reference data)
    fn create_ingredient(&self, ingredient: &Ingredient) -> Result<()>;
    fn get_ingredient(&self, id: &str) -> Result<Option<Ingredient>>;
    fn find_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Option<Ingredient>>;
    fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>>;

    // Recipe aggregate: the recipe row and its association batch persist (or
    // fail) together
    fn create_recipe(&self, recipe: &Recipe, lines: &[IngredientLine]) -> Result<()>;
    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>>;
    fn list_recipes(&self, filter: &RecipeFilter, cursor: &str, limit: i32) -> Result<Vec<Recipe>>;
    fn list_author_recipes(&self, author_id: &str, limit: i64) -> Result<Vec<Recipe>>;
    fn count_author_recipes(&self, author_id: &str) -> Result<i64>;
    fn update_recipe(&self, recipe: &Recipe, lines: Option<&[IngredientLine]>) -> Result<()>;
    fn delete_recipe(&self, id: &str) -> Result<bool>;
    fn list_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<RecipeIngredient>>;

    // Relation sets (favorite / shopping cart), one routine per shape
    fn add_recipe_relation(&self, kind: RelationKind, user_id: &str, recipe_id: &str)
    -> Result<()>;
    fn remove_recipe_relation(
        &self,
        kind: RelationKind,
        user_id: &str,
        recipe_id: &str,
    ) -> Result<bool>;
    fn has_recipe_relation(
        &self,
        kind: RelationKind,
        user_id: &str,
        recipe_id: &str,
    ) -> Result<bool>;

    // Subscriptions (user -> author)
    fn add_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<()>;
    fn remove_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<bool>;
    fn has_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<bool>;
    fn list_subscribed_authors(&self, subscriber_id: &str, cursor: &str, limit: i32)
    -> Result<Vec<User>>;

    // Shopping list aggregate
    fn shopping_list(&self, user_id: &str) -> Result<Vec<ShoppingListEntry>>;

    fn close(&self) -> Result<()>;
}
