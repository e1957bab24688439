//! Shared check-then-mutate routine for the (user, recipe) relation sets.
//! Favorite and shopping-cart endpoints differ only in the `RelationKind`
//! they pass; the policy lives here once. The existence pre-check gives a
//! clean error in the common case, but the pair primary key in the store is
//! what actually wins a race.

use axum::{Json, http::StatusCode};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::RecipeSummary;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{RelationKind, User};

pub(super) fn add_recipe_to_set(
    state: &AppState,
    user: &User,
    recipe_id: &str,
    kind: RelationKind,
) -> Result<(StatusCode, Json<ApiResponse<RecipeSummary>>), ApiError> {
    let store = state.store.as_ref();

    let recipe = store
        .get_recipe(recipe_id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    if store
        .has_recipe_relation(kind, &user.id, &recipe.id)
        .api_err("Failed to check relation")?
    {
        return Err(already_in(kind));
    }

    match store.add_recipe_relation(kind, &user.id, &recipe.id) {
        Ok(()) => {}
        // Race loser: someone inserted the pair between the check and here.
        Err(Error::AlreadyExists) => return Err(already_in(kind)),
        Err(_) => return Err(ApiError::internal("Failed to add recipe")),
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RecipeSummary::new(&recipe))),
    ))
}

pub(super) fn remove_recipe_from_set(
    state: &AppState,
    user: &User,
    recipe_id: &str,
    kind: RelationKind,
) -> Result<StatusCode, ApiError> {
    let store = state.store.as_ref();

    let recipe = store
        .get_recipe(recipe_id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    let removed = store
        .remove_recipe_relation(kind, &user.id, &recipe.id)
        .api_err("Failed to remove recipe")?;

    if !removed {
        return Err(ApiError::not_found(format!(
            "Recipe is not in {}",
            kind.describe()
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn already_in(kind: RelationKind) -> ApiError {
    ApiError::conflict(format!("Recipe is already in {}", kind.describe()))
}
