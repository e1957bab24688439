use serde::{Deserialize, Serialize};

use crate::server::media;
use crate::types::{Recipe, RecipeIngredient, User};

// Auth

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

// Users

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAvatarRequest {
    pub avatar: String,
}

/// Public view of a user. `is_subscribed` is a per-viewer projection, never a
/// stored field; anonymous viewers always see false.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar: user.avatar.as_deref().map(media::media_url),
            is_subscribed,
        }
    }
}

/// Author summary with an embedded recipe preview, returned by the
/// subscription endpoints.
#[derive(Debug, Serialize)]
pub struct UserWithRecipesResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

// Recipes

#[derive(Debug, Deserialize)]
pub struct IngredientLineRequest {
    pub id: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub ingredients: Vec<IngredientLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientLineRequest>>,
}

/// Full recipe projection: resolved ingredient lines, author summary, and the
/// two per-viewer flags.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: String,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Shareable link to a recipe, absolute when the request carried a Host.
#[derive(Debug, Serialize)]
pub struct RecipeLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

/// Minified recipe, used as the confirmation payload for relation-set adds
/// and inside author summaries.
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

impl RecipeSummary {
    #[must_use]
    pub fn new(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            image: media::media_url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

// List parameters

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRecipesParams {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_favorited: Option<bool>,
    #[serde(default)]
    pub is_in_shopping_cart: Option<bool>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListIngredientsParams {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionParams {
    #[serde(default)]
    pub recipes_limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

// Admin catalog

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportIngredientsRequest {
    pub ingredients: Vec<CreateIngredientRequest>,
}

#[derive(Debug, Serialize)]
pub struct ImportIngredientsResponse {
    pub imported: usize,
    pub skipped: usize,
}
