mod auth;
mod ingredients;
mod projections;
mod recipes;
mod relations;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/token", post(auth::login))
        .route("/auth/token", delete(auth::logout))
        // Users
        .route("/users", post(users::register))
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route("/users/me/avatar", put(users::set_avatar))
        .route("/users/me/avatar", delete(users::delete_avatar))
        .route("/users/set_password", post(users::set_password))
        .route("/users/subscriptions", get(users::list_subscriptions))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/subscribe", post(users::subscribe))
        .route("/users/{id}/subscribe", delete(users::unsubscribe))
        // Ingredient catalog (read-only here; writes go through admin)
        .route("/ingredients", get(ingredients::list_ingredients))
        .route("/ingredients/{id}", get(ingredients::get_ingredient))
        // Recipes
        .route("/recipes", get(recipes::list_recipes))
        .route("/recipes", post(recipes::create_recipe))
        .route(
            "/recipes/download_shopping_cart",
            get(recipes::download_shopping_cart),
        )
        .route("/recipes/{id}", get(recipes::get_recipe))
        .route("/recipes/{id}/get-link", get(recipes::get_link))
        .route("/recipes/{id}", patch(recipes::update_recipe))
        .route("/recipes/{id}", delete(recipes::delete_recipe))
        // Relation sets
        .route("/recipes/{id}/favorite", post(recipes::add_favorite))
        .route("/recipes/{id}/favorite", delete(recipes::remove_favorite))
        .route(
            "/recipes/{id}/shopping_cart",
            post(recipes::add_to_shopping_cart),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            delete(recipes::remove_from_shopping_cart),
        )
}
