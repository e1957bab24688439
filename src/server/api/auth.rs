use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireUser, TokenGenerator};
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::Token;

/// POST /auth/token — exchanges email + password for a bearer token.
/// The error message never reveals which of the two was wrong.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = store
        .get_user_by_email(&req.email)
        .api_err("Failed to look up user")?
        .ok_or_else(invalid)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(&req.password, &user.password_hash)
        .map_err(|_| ApiError::internal("Failed to verify password"))?
    {
        return Err(invalid());
    }

    let (raw_token, lookup, hash) = generator
        .generate()
        .map_err(|_| ApiError::internal("Failed to generate token"))?;

    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        is_admin: false,
        user_id: Some(user.id),
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };

    store.create_token(&token).api_err("Failed to store token")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(LoginResponse { token: raw_token })),
    ))
}

/// DELETE /auth/token — revokes the token used to authenticate the request.
pub async fn logout(auth: RequireUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .store
        .delete_token(&auth.token.id)
        .api_err("Failed to revoke token")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
