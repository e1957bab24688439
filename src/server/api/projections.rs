//! Read-side projections. The viewer-dependent flags (`is_subscribed`,
//! `is_favorited`, `is_in_shopping_cart`) are computed here at read time;
//! anonymous viewers always get false.

use crate::server::dto::{RecipeResponse, RecipeSummary, UserResponse, UserWithRecipesResponse};
use crate::server::media;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Recipe, RelationKind, User};

/// Default number of recipes embedded per author in subscription payloads.
pub(super) const DEFAULT_RECIPES_LIMIT: i64 = 3;

pub(super) fn user_response(
    store: &dyn Store,
    viewer: Option<&User>,
    user: &User,
) -> Result<UserResponse, ApiError> {
    let is_subscribed = match viewer {
        Some(viewer) if viewer.id != user.id => store
            .has_subscription(&viewer.id, &user.id)
            .api_err("Failed to check subscription")?,
        _ => false,
    };
    Ok(UserResponse::new(user, is_subscribed))
}

pub(super) fn user_with_recipes(
    store: &dyn Store,
    viewer: Option<&User>,
    user: &User,
    recipes_limit: i64,
) -> Result<UserWithRecipesResponse, ApiError> {
    let recipes = store
        .list_author_recipes(&user.id, recipes_limit.max(0))
        .api_err("Failed to list author recipes")?;
    let recipes_count = store
        .count_author_recipes(&user.id)
        .api_err("Failed to count author recipes")?;

    Ok(UserWithRecipesResponse {
        user: user_response(store, viewer, user)?,
        recipes: recipes.iter().map(RecipeSummary::new).collect(),
        recipes_count,
    })
}

pub(super) fn recipe_response(
    store: &dyn Store,
    viewer: Option<&User>,
    recipe: &Recipe,
) -> Result<RecipeResponse, ApiError> {
    let author = store
        .get_user(&recipe.author_id)
        .api_err("Failed to get recipe author")?
        .or_not_found("Recipe author not found")?;

    let ingredients = store
        .list_recipe_ingredients(&recipe.id)
        .api_err("Failed to list recipe ingredients")?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            store
                .has_recipe_relation(RelationKind::Favorite, &viewer.id, &recipe.id)
                .api_err("Failed to check favorites")?,
            store
                .has_recipe_relation(RelationKind::ShoppingCart, &viewer.id, &recipe.id)
                .api_err("Failed to check shopping cart")?,
        ),
        None => (false, false),
    };

    Ok(RecipeResponse {
        id: recipe.id.clone(),
        name: recipe.name.clone(),
        image: media::media_url(&recipe.image),
        text: recipe.text.clone(),
        cooking_time: recipe.cooking_time,
        author: user_response(store, viewer, &author)?,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        created_at: recipe.created_at,
    })
}
