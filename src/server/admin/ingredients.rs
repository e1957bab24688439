use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{
    CreateIngredientRequest, ImportIngredientsRequest, ImportIngredientsResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::Ingredient;

fn validate_catalog_entry(req: &CreateIngredientRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Ingredient name cannot be empty"));
    }
    if req.measurement_unit.trim().is_empty() {
        return Err(ApiError::bad_request("Measurement unit cannot be empty"));
    }
    Ok(())
}

pub async fn create_ingredient(
    _auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateIngredientRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_catalog_entry(&req)?;

    if store
        .find_ingredient(&req.name, &req.measurement_unit)
        .api_err("Failed to check ingredient")?
        .is_some()
    {
        return Err(ApiError::conflict("Ingredient already exists"));
    }

    let ingredient = Ingredient {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        measurement_unit: req.measurement_unit,
    };

    store
        .create_ingredient(&ingredient)
        .api_err("Failed to create ingredient")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(ingredient))))
}

/// Bulk catalog load with get-or-create semantics: existing (name, unit)
/// pairs are counted as skipped, never duplicated.
pub async fn import_ingredients(
    _auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportIngredientsRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut imported = 0;
    let mut skipped = 0;

    for entry in &req.ingredients {
        validate_catalog_entry(entry)?;

        if store
            .find_ingredient(&entry.name, &entry.measurement_unit)
            .api_err("Failed to check ingredient")?
            .is_some()
        {
            skipped += 1;
            continue;
        }

        let ingredient = Ingredient {
            id: Uuid::new_v4().to_string(),
            name: entry.name.clone(),
            measurement_unit: entry.measurement_unit.clone(),
        };
        store
            .create_ingredient(&ingredient)
            .api_err("Failed to create ingredient")?;
        imported += 1;
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(ImportIngredientsResponse {
        imported,
        skipped,
    })))
}
