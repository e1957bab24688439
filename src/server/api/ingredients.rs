use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::ListIngredientsParams;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};

/// Catalog listing, alphabetical, optionally restricted to a name prefix.
/// No pagination: the catalog is small, static reference data.
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListIngredientsParams>,
) -> impl IntoResponse {
    let ingredients = state
        .store
        .list_ingredients(params.name.as_deref())
        .api_err("Failed to list ingredients")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ingredients)))
}

pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ingredient = state
        .store
        .get_ingredient(&id)
        .api_err("Failed to get ingredient")?
        .or_not_found("Ingredient not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ingredient)))
}
