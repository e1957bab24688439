mod ingredients;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Ingredient catalog maintenance
        .route("/ingredients", post(ingredients::create_ingredient))
        .route("/ingredients/import", post(ingredients::import_ingredients))
        // User overview
        .route("/users", get(users::list_users))
}
