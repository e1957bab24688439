use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{OptionalUser, RequireUser};
use crate::server::AppState;
use crate::server::dto::{
    CreateRecipeRequest, IngredientLineRequest, ListRecipesParams, RecipeLinkResponse,
    UpdateRecipeRequest,
};
use crate::server::media;
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{
    validate_cooking_time, validate_ingredient_lines, validate_recipe_name,
};
use crate::store::{IngredientLine, RecipeFilter, Store};
use crate::types::{Recipe, RelationKind, ShoppingListEntry};

use super::projections::recipe_response;
use super::relations::{add_recipe_to_set, remove_recipe_from_set};

pub async fn list_recipes(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRecipesParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let cursor = params.cursor.as_deref().unwrap_or("");

    // Relation-set filters are viewer-relative; they fall away for anonymous
    // requests rather than erroring.
    let filter = RecipeFilter {
        author_id: params.author.clone(),
        favorited_by: match (params.is_favorited, &viewer) {
            (Some(true), Some(viewer)) => Some(viewer.id.clone()),
            _ => None,
        },
        in_cart_of: match (params.is_in_shopping_cart, &viewer) {
            (Some(true), Some(viewer)) => Some(viewer.id.clone()),
            _ => None,
        },
    };

    let recipes = store
        .list_recipes(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list recipes")?;

    let (recipes, next_cursor, has_more) =
        paginate(recipes, DEFAULT_PAGE_SIZE as usize, |r| r.id.clone());

    let responses = recipes
        .iter()
        .map(|r| recipe_response(store, viewer.as_ref(), r))
        .collect::<Result<Vec<_>, _>>()?;

    Ok::<_, ApiError>(Json(PaginatedResponse::new(responses, next_cursor, has_more)))
}

/// Resolves request lines against the ingredient catalog. Any unknown
/// reference fails the whole operation before a write happens.
fn resolve_ingredient_lines(
    store: &dyn Store,
    lines: &[IngredientLineRequest],
) -> Result<Vec<IngredientLine>, ApiError> {
    lines
        .iter()
        .map(|line| {
            store
                .get_ingredient(&line.id)
                .api_err("Failed to resolve ingredient")?
                .ok_or_else(|| ApiError::bad_request(format!("Unknown ingredient: {}", line.id)))?;
            Ok(IngredientLine {
                ingredient_id: line.id.clone(),
                amount: line.amount,
            })
        })
        .collect()
}

pub async fn create_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRecipeRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_recipe_name(&req.name)?;
    validate_cooking_time(req.cooking_time, &state.bounds)?;
    validate_ingredient_lines(&req.ingredients, &state.bounds)?;
    let lines = resolve_ingredient_lines(store, &req.ingredients)?;

    let image = media::save_base64_image(&state.data_dir, "recipes", &req.image)?;

    let recipe = Recipe {
        id: Uuid::new_v4().to_string(),
        author_id: auth.user.id.clone(),
        name: req.name,
        image,
        text: req.text,
        cooking_time: req.cooking_time,
        created_at: Utc::now(),
    };

    store
        .create_recipe(&recipe, &lines)
        .api_err("Failed to create recipe")?;

    let body = recipe_response(store, Some(&auth.user), &recipe)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(body))))
}

pub async fn get_recipe(
    OptionalUser(viewer): OptionalUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let recipe = store
        .get_recipe(&id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    let body = recipe_response(store, viewer.as_ref(), &recipe)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(body)))
}

pub async fn update_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecipeRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut recipe = store
        .get_recipe(&id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    // The author is the sole writer; the author field itself never changes.
    if recipe.author_id != auth.user.id {
        return Err(ApiError::forbidden("Only the author can modify a recipe"));
    }

    if let Some(name) = req.name {
        validate_recipe_name(&name)?;
        recipe.name = name;
    }
    if let Some(text) = req.text {
        recipe.text = text;
    }
    if let Some(cooking_time) = req.cooking_time {
        validate_cooking_time(cooking_time, &state.bounds)?;
        recipe.cooking_time = cooking_time;
    }

    let lines = match &req.ingredients {
        Some(lines) => {
            validate_ingredient_lines(lines, &state.bounds)?;
            Some(resolve_ingredient_lines(store, lines)?)
        }
        None => None,
    };

    let old_image = match req.image {
        Some(data_uri) => {
            let new_image = media::save_base64_image(&state.data_dir, "recipes", &data_uri)?;
            Some(std::mem::replace(&mut recipe.image, new_image))
        }
        None => None,
    };

    if store.update_recipe(&recipe, lines.as_deref()).is_err() {
        // A replacement image was already written for this request; it has no
        // owning row now, so remove it.
        if old_image.is_some() {
            media::remove_media_file(&state.data_dir, &recipe.image);
        }
        return Err(ApiError::internal("Failed to update recipe"));
    }

    if let Some(old_image) = old_image {
        media::remove_media_file(&state.data_dir, &old_image);
    }

    let body = recipe_response(store, Some(&auth.user), &recipe)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(body)))
}

pub async fn delete_recipe(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let recipe = store
        .get_recipe(&id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    if recipe.author_id != auth.user.id {
        return Err(ApiError::forbidden("Only the author can delete a recipe"));
    }

    store
        .delete_recipe(&recipe.id)
        .api_err("Failed to delete recipe")?;
    media::remove_media_file(&state.data_dir, &recipe.image);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// GET /recipes/{id}/get-link — a shareable URL for the recipe, absolute when
/// the request carries a Host header.
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let recipe = state
        .store
        .get_recipe(&id)
        .api_err("Failed to get recipe")?
        .or_not_found("Recipe not found")?;

    let path = format!("/api/v1/recipes/{}", recipe.id);
    let short_link = match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path,
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(RecipeLinkResponse { short_link })))
}

// Relation sets

pub async fn add_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    add_recipe_to_set(&state, &auth.user, &id, RelationKind::Favorite)
}

pub async fn remove_favorite(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    remove_recipe_from_set(&state, &auth.user, &id, RelationKind::Favorite)
}

pub async fn add_to_shopping_cart(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    add_recipe_to_set(&state, &auth.user, &id, RelationKind::ShoppingCart)
}

pub async fn remove_from_shopping_cart(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    remove_recipe_from_set(&state, &auth.user, &id, RelationKind::ShoppingCart)
}

// Shopping list export

/// Renders the aggregated list as the plain-text download body.
fn render_shopping_list(entries: &[ShoppingListEntry]) -> String {
    let mut out = String::from("Список покупок:\n\n");
    for entry in entries {
        out.push_str(&format!(
            "- {} ({}) - {}\n",
            entry.name, entry.measurement_unit, entry.total_amount
        ));
    }
    out
}

pub async fn download_shopping_cart(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let entries = state
        .store
        .shopping_list(&auth.user.id)
        .api_err("Failed to build shopping list")?;

    let body = render_shopping_list(&entries);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8".parse().unwrap(),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"shopping_list.txt\"".parse().unwrap(),
    );

    Ok::<_, ApiError>((StatusCode::OK, headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::RequireUser;
    use crate::config::RecipeBounds;
    use crate::error::{Error, Result as StoreResult};
    use crate::types::{Ingredient, RecipeIngredient, Token, User};

    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    /// Store double whose `update_recipe` always fails; only the lookups the
    /// update handler performs before the write are implemented.
    struct UpdateFailsStore {
        recipe: Recipe,
    }

    impl Store for UpdateFailsStore {
        fn get_recipe(&self, _id: &str) -> StoreResult<Option<Recipe>> {
            Ok(Some(self.recipe.clone()))
        }

        fn update_recipe(
            &self,
            _recipe: &Recipe,
            _lines: Option<&[IngredientLine]>,
        ) -> StoreResult<()> {
            Err(Error::NotFound)
        }

        fn initialize(&self) -> StoreResult<()> {
            unimplemented!()
        }
        fn create_user(&self, _user: &User) -> StoreResult<()> {
            unimplemented!()
        }
        fn get_user(&self, _id: &str) -> StoreResult<Option<User>> {
            unimplemented!()
        }
        fn get_user_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
            unimplemented!()
        }
        fn get_user_by_username(&self, _username: &str) -> StoreResult<Option<User>> {
            unimplemented!()
        }
        fn list_users(&self, _cursor: &str, _limit: i32) -> StoreResult<Vec<User>> {
            unimplemented!()
        }
        fn update_user(&self, _user: &User) -> StoreResult<()> {
            unimplemented!()
        }
        fn create_token(&self, _token: &Token) -> StoreResult<()> {
            unimplemented!()
        }
        fn get_token_by_lookup(&self, _lookup: &str) -> StoreResult<Option<Token>> {
            unimplemented!()
        }
        fn delete_token(&self, _id: &str) -> StoreResult<bool> {
            unimplemented!()
        }
        fn update_token_last_used(&self, _id: &str) -> StoreResult<()> {
            unimplemented!()
        }
        fn has_admin_token(&self) -> StoreResult<bool> {
            unimplemented!()
        }
        fn create_ingredient(&self, _ingredient: &Ingredient) -> StoreResult<()> {
            unimplemented!()
        }
        fn get_ingredient(&self, _id: &str) -> StoreResult<Option<Ingredient>> {
            unimplemented!()
        }
        fn find_ingredient(&self, _name: &str, _unit: &str) -> StoreResult<Option<Ingredient>> {
            unimplemented!()
        }
        fn list_ingredients(&self, _name_prefix: Option<&str>) -> StoreResult<Vec<Ingredient>> {
            unimplemented!()
        }
        fn create_recipe(&self, _recipe: &Recipe, _lines: &[IngredientLine]) -> StoreResult<()> {
            unimplemented!()
        }
        fn list_recipes(
            &self,
            _filter: &RecipeFilter,
            _cursor: &str,
            _limit: i32,
        ) -> StoreResult<Vec<Recipe>> {
            unimplemented!()
        }
        fn list_author_recipes(&self, _author_id: &str, _limit: i64) -> StoreResult<Vec<Recipe>> {
            unimplemented!()
        }
        fn count_author_recipes(&self, _author_id: &str) -> StoreResult<i64> {
            unimplemented!()
        }
        fn delete_recipe(&self, _id: &str) -> StoreResult<bool> {
            unimplemented!()
        }
        fn list_recipe_ingredients(&self, _recipe_id: &str) -> StoreResult<Vec<RecipeIngredient>> {
            unimplemented!()
        }
        fn add_recipe_relation(
            &self,
            _kind: RelationKind,
            _user_id: &str,
            _recipe_id: &str,
        ) -> StoreResult<()> {
            unimplemented!()
        }
        fn remove_recipe_relation(
            &self,
            _kind: RelationKind,
            _user_id: &str,
            _recipe_id: &str,
        ) -> StoreResult<bool> {
            unimplemented!()
        }
        fn has_recipe_relation(
            &self,
            _kind: RelationKind,
            _user_id: &str,
            _recipe_id: &str,
        ) -> StoreResult<bool> {
            unimplemented!()
        }
        fn add_subscription(&self, _subscriber_id: &str, _author_id: &str) -> StoreResult<()> {
            unimplemented!()
        }
        fn remove_subscription(&self, _subscriber_id: &str, _author_id: &str) -> StoreResult<bool> {
            unimplemented!()
        }
        fn has_subscription(&self, _subscriber_id: &str, _author_id: &str) -> StoreResult<bool> {
            unimplemented!()
        }
        fn list_subscribed_authors(
            &self,
            _subscriber_id: &str,
            _cursor: &str,
            _limit: i32,
        ) -> StoreResult<Vec<User>> {
            unimplemented!()
        }
        fn shopping_list(&self, _user_id: &str) -> StoreResult<Vec<ShoppingListEntry>> {
            unimplemented!()
        }
        fn close(&self) -> StoreResult<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn failed_update_does_not_orphan_new_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let now = Utc::now();

        let user = User {
            id: "author-1".to_string(),
            email: "author@example.com".to_string(),
            username: "author".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "$argon2id$fake".to_string(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        let recipe = Recipe {
            id: "recipe-1".to_string(),
            author_id: user.id.clone(),
            name: "bread".to_string(),
            image: "recipes/old.png".to_string(),
            text: "bake".to_string(),
            cooking_time: 10,
            created_at: now,
        };
        let auth = RequireUser {
            token: Token {
                id: "token-1".to_string(),
                token_hash: String::new(),
                token_lookup: String::new(),
                is_admin: false,
                user_id: Some(user.id.clone()),
                created_at: now,
                expires_at: None,
                last_used_at: None,
            },
            user,
        };

        let state = Arc::new(AppState {
            store: Arc::new(UpdateFailsStore {
                recipe: recipe.clone(),
            }),
            data_dir: dir.path().to_path_buf(),
            bounds: RecipeBounds::default(),
        });

        let req = UpdateRecipeRequest {
            name: None,
            image: Some(format!("data:image/png;base64,{TINY_PNG}")),
            text: None,
            cooking_time: None,
            ingredients: None,
        };

        let response = update_recipe(auth, State(state), Path(recipe.id.clone()), Json(req))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // The replacement image written before the failed store call must be
        // gone again.
        let leftover = std::fs::read_dir(dir.path().join("media").join("recipes"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[test]
    fn shopping_list_rendering_format() {
        let entries = [
            ShoppingListEntry {
                name: "flour".to_string(),
                measurement_unit: "g".to_string(),
                total_amount: 300,
            },
            ShoppingListEntry {
                name: "sugar".to_string(),
                measurement_unit: "g".to_string(),
                total_amount: 50,
            },
        ];

        assert_eq!(
            render_shopping_list(&entries),
            "Список покупок:\n\n- flour (g) - 300\n- sugar (g) - 50\n"
        );
    }

    #[test]
    fn empty_shopping_list_renders_header_only() {
        assert_eq!(render_shopping_list(&[]), "Список покупок:\n\n");
    }
}
