use std::collections::HashSet;

use crate::config::RecipeBounds;
use crate::server::dto::IngredientLineRequest;
use crate::server::response::ApiError;

const MAX_RECIPE_NAME_LEN: usize = 200;
const MAX_USERNAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 100;

/// Checks an ingredient line set before anything touches the database:
/// non-empty, no repeated ingredient reference, every amount within the
/// injected bounds.
pub fn validate_ingredient_lines(
    lines: &[IngredientLineRequest],
    bounds: &RecipeBounds,
) -> Result<(), ApiError> {
    if lines.is_empty() {
        return Err(ApiError::bad_request(
            "Recipe must contain at least one ingredient",
        ));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if !seen.insert(line.id.as_str()) {
            return Err(ApiError::bad_request("Ingredients must not repeat"));
        }
        if line.amount < bounds.min_ingredient_amount {
            return Err(ApiError::bad_request(format!(
                "Ingredient amount must be at least {}",
                bounds.min_ingredient_amount
            )));
        }
        if line.amount > bounds.max_ingredient_amount {
            return Err(ApiError::bad_request(format!(
                "Ingredient amount cannot exceed {}",
                bounds.max_ingredient_amount
            )));
        }
    }

    Ok(())
}

pub fn validate_cooking_time(cooking_time: i64, bounds: &RecipeBounds) -> Result<(), ApiError> {
    if cooking_time < bounds.min_cooking_time {
        return Err(ApiError::bad_request(format!(
            "Cooking time must be at least {}",
            bounds.min_cooking_time
        )));
    }
    if cooking_time > bounds.max_cooking_time {
        return Err(ApiError::bad_request(format!(
            "Cooking time cannot exceed {}",
            bounds.max_cooking_time
        )));
    }
    Ok(())
}

pub fn validate_recipe_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Recipe name cannot be empty"));
    }
    if name.len() > MAX_RECIPE_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Recipe name cannot exceed {MAX_RECIPE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::bad_request(
            "Username can only contain alphanumeric characters, hyphens, underscores, and periods",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request(format!(
            "Email cannot exceed {MAX_EMAIL_LEN} characters"
        )));
    }
    // A full RFC parse buys nothing here; uniqueness and login are keyed on
    // the exact string.
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::bad_request("Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}
