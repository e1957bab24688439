use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{OptionalUser, RequireUser, TokenGenerator};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    PaginationParams, RegisterRequest, SetAvatarRequest, SetPasswordRequest, SubscriptionParams,
};
use crate::server::media;
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{validate_email, validate_username};
use crate::types::User;

use super::projections::{DEFAULT_RECIPES_LIMIT, user_response, user_with_recipes};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_email(&req.email)?;
    validate_username(&req.username)?;
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    if store
        .get_user_by_email(&req.email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::conflict("Email already registered"));
    }
    if store
        .get_user_by_username(&req.username)
        .api_err("Failed to check username")?
        .is_some()
    {
        return Err(ApiError::conflict("Username already taken"));
    }

    let generator = TokenGenerator::new();
    let password_hash = generator
        .hash(&req.password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: req.email,
        username: req.username,
        first_name: req.first_name,
        last_name: req.last_name,
        password_hash,
        avatar: None,
        created_at: now,
        updated_at: now,
    };

    match store.create_user(&user) {
        Ok(()) => {}
        // Uniqueness race on email/username settled by the constraint.
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("User already exists")),
        Err(_) => return Err(ApiError::internal("Failed to create user")),
    }

    let body = user_response(store, None, &user)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(body))))
}

pub async fn list_users(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    let responses = users
        .iter()
        .map(|u| user_response(store, viewer.as_ref(), u))
        .collect::<Result<Vec<_>, _>>()?;

    Ok::<_, ApiError>(Json(PaginatedResponse::new(responses, next_cursor, has_more)))
}

pub async fn me(auth: RequireUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = user_response(state.store.as_ref(), Some(&auth.user), &auth.user)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(body)))
}

pub async fn get_user(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let user = store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let body = user_response(store, viewer.as_ref(), &user)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(body)))
}

pub async fn set_password(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetPasswordRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let generator = TokenGenerator::new();

    let current_ok = generator
        .verify(&req.current_password, &auth.user.password_hash)
        .map_err(|_| ApiError::internal("Failed to verify password"))?;
    if !current_ok {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    if req.new_password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let mut user = auth.user;
    user.password_hash = generator
        .hash(&req.new_password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;
    user.updated_at = Utc::now();

    store.update_user(&user).api_err("Failed to update user")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn set_avatar(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetAvatarRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let new_avatar = media::save_base64_image(&state.data_dir, "avatars", &req.avatar)?;

    let mut user = auth.user;
    let old_avatar = user.avatar.replace(new_avatar);
    user.updated_at = Utc::now();

    store.update_user(&user).api_err("Failed to update user")?;

    if let Some(old_avatar) = old_avatar {
        media::remove_media_file(&state.data_dir, &old_avatar);
    }

    let body = user_response(store, Some(&user), &user)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(body)))
}

pub async fn delete_avatar(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut user = auth.user;
    let old_avatar = user.avatar.take();
    user.updated_at = Utc::now();

    store.update_user(&user).api_err("Failed to update user")?;

    if let Some(old_avatar) = old_avatar {
        media::remove_media_file(&state.data_dir, &old_avatar);
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Subscriptions

pub async fn list_subscriptions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubscriptionParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let cursor = params.cursor.as_deref().unwrap_or("");
    let recipes_limit = params.recipes_limit.unwrap_or(DEFAULT_RECIPES_LIMIT);

    let authors = store
        .list_subscribed_authors(&auth.user.id, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list subscriptions")?;

    let (authors, next_cursor, has_more) =
        paginate(authors, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    let responses = authors
        .iter()
        .map(|author| user_with_recipes(store, Some(&auth.user), author, recipes_limit))
        .collect::<Result<Vec<_>, _>>()?;

    Ok::<_, ApiError>(Json(PaginatedResponse::new(responses, next_cursor, has_more)))
}

pub async fn subscribe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SubscriptionParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let author = store
        .get_user(&id)
        .api_err("Failed to get author")?
        .or_not_found("Author not found")?;

    if author.id == auth.user.id {
        return Err(ApiError::bad_request("Cannot subscribe to yourself"));
    }

    if store
        .has_subscription(&auth.user.id, &author.id)
        .api_err("Failed to check subscription")?
    {
        return Err(ApiError::conflict("Already subscribed to this author"));
    }

    match store.add_subscription(&auth.user.id, &author.id) {
        Ok(()) => {}
        Err(Error::SelfSubscription) => {
            return Err(ApiError::bad_request("Cannot subscribe to yourself"));
        }
        Err(Error::AlreadyExists) => {
            return Err(ApiError::conflict("Already subscribed to this author"));
        }
        Err(_) => return Err(ApiError::internal("Failed to subscribe")),
    }

    let recipes_limit = params.recipes_limit.unwrap_or(DEFAULT_RECIPES_LIMIT);
    let body = user_with_recipes(store, Some(&auth.user), &author, recipes_limit)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(body))))
}

pub async fn unsubscribe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let author = store
        .get_user(&id)
        .api_err("Failed to get author")?
        .or_not_found("Author not found")?;

    let removed = store
        .remove_subscription(&auth.user.id, &author.id)
        .api_err("Failed to unsubscribe")?;

    if !removed {
        return Err(ApiError::not_found("Not subscribed to this author"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
