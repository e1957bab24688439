use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{IngredientLine, RecipeFilter, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        password_hash: row.get(5)?,
        avatar: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        author_id: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        text: row.get(4)?,
        cooking_time: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, avatar, created_at, updated_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";
const RECIPE_COLUMNS: &str = "id, author_id, name, image, text, cooking_time, created_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, username, first_name, last_name, password_hash, avatar, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.email,
                user.username,
                user.first_name,
                user.last_name,
                user.password_hash,
                user.avatar,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET email = ?1, username = ?2, first_name = ?3, last_name = ?4,
                 password_hash = ?5, avatar = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                user.email,
                user.username,
                user.first_name,
                user.last_name,
                user.password_hash,
                user.avatar,
                format_datetime(&user.updated_at),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tokens WHERE is_admin = 1)",
            [],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // Ingredient catalog

    fn create_ingredient(&self, ingredient: &Ingredient) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO ingredients (id, name, measurement_unit) VALUES (?1, ?2, ?3)",
            params![ingredient.id, ingredient.name, ingredient.measurement_unit],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_ingredient(&self, id: &str) -> Result<Option<Ingredient>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1",
            params![id],
            |row| {
                Ok(Ingredient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    measurement_unit: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Option<Ingredient>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, measurement_unit FROM ingredients
             WHERE name = ?1 AND measurement_unit = ?2",
            params![name, measurement_unit],
            |row| {
                Ok(Ingredient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    measurement_unit: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let pattern = name_prefix.map(like_prefix_pattern);
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, measurement_unit FROM ingredients
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
             ORDER BY name, measurement_unit",
        )?;

        let rows = stmt.query_map(params![pattern], |row| {
            Ok(Ingredient {
                id: row.get(0)?,
                name: row.get(1)?,
                measurement_unit: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Recipe aggregate

    fn create_recipe(&self, recipe: &Recipe, lines: &[IngredientLine]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO recipes (id, author_id, name, image, text, cooking_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                recipe.id,
                recipe.author_id,
                recipe.name,
                recipe.image,
                recipe.text,
                recipe.cooking_time,
                format_datetime(&recipe.created_at),
            ],
        )?;

        insert_ingredient_lines(&tx, &recipe.id, lines)?;

        tx.commit()?;
        Ok(())
    }

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
            params![id],
            recipe_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_recipes(&self, filter: &RecipeFilter, cursor: &str, limit: i32) -> Result<Vec<Recipe>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r
             WHERE r.id > ?1
               AND (?2 IS NULL OR r.author_id = ?2)
               AND (?3 IS NULL OR EXISTS (
                   SELECT 1 FROM favorites f
                   WHERE f.recipe_id = r.id AND f.user_id = ?3))
               AND (?4 IS NULL OR EXISTS (
                   SELECT 1 FROM shopping_cart s
                   WHERE s.recipe_id = r.id AND s.user_id = ?4))
             ORDER BY r.id LIMIT ?5"
        ))?;

        let rows = stmt.query_map(
            params![
                cursor,
                filter.author_id,
                filter.favorited_by,
                filter.in_cart_of,
                limit
            ],
            recipe_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_author_recipes(&self, author_id: &str, limit: i64) -> Result<Vec<Recipe>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes
             WHERE author_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![author_id, limit], recipe_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_author_recipes(&self, author_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_recipe(&self, recipe: &Recipe, lines: Option<&[IngredientLine]>) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE recipes SET name = ?1, image = ?2, text = ?3, cooking_time = ?4 WHERE id = ?5",
            params![
                recipe.name,
                recipe.image,
                recipe.text,
                recipe.cooking_time,
                recipe.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        // Replace-all semantics: the prior association set is discarded
        // wholesale, never diffed.
        if let Some(lines) = lines {
            tx.execute(
                "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
                params![recipe.id],
            )?;
            insert_ingredient_lines(&tx, &recipe.id, lines)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_recipe(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_recipe_ingredients(&self, recipe_id: &str) -> Result<Vec<RecipeIngredient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT i.id, i.name, i.measurement_unit, ri.amount
             FROM recipe_ingredients ri
             JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = ?1
             ORDER BY i.name",
        )?;

        let rows = stmt.query_map(params![recipe_id], |row| {
            Ok(RecipeIngredient {
                ingredient_id: row.get(0)?,
                name: row.get(1)?,
                measurement_unit: row.get(2)?,
                amount: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Relation sets

    fn add_recipe_relation(
        &self,
        kind: RelationKind,
        user_id: &str,
        recipe_id: &str,
    ) -> Result<()> {
        // The pair primary key settles races; a loser gets AlreadyExists.
        let result = self.conn().execute(
            &format!(
                "INSERT INTO {} (user_id, recipe_id) VALUES (?1, ?2)",
                kind.table()
            ),
            params![user_id, recipe_id],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn remove_recipe_relation(
        &self,
        kind: RelationKind,
        user_id: &str,
        recipe_id: &str,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
                kind.table()
            ),
            params![user_id, recipe_id],
        )?;
        Ok(rows > 0)
    }

    fn has_recipe_relation(
        &self,
        kind: RelationKind,
        user_id: &str,
        recipe_id: &str,
    ) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND recipe_id = ?2)",
                kind.table()
            ),
            params![user_id, recipe_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // Subscriptions

    fn add_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<()> {
        if subscriber_id == author_id {
            return Err(Error::SelfSubscription);
        }

        let result = self.conn().execute(
            "INSERT INTO subscriptions (subscriber_id, author_id) VALUES (?1, ?2)",
            params![subscriber_id, author_id],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn remove_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND author_id = ?2",
            params![subscriber_id, author_id],
        )?;
        Ok(rows > 0)
    }

    fn has_subscription(&self, subscriber_id: &str, author_id: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = ?1 AND author_id = ?2)",
            params![subscriber_id, author_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_subscribed_authors(
        &self,
        subscriber_id: &str,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash,
                    u.avatar, u.created_at, u.updated_at
             FROM users u
             JOIN subscriptions s ON s.author_id = u.id
             WHERE s.subscriber_id = ?1 AND u.id > ?2
             ORDER BY u.id LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![subscriber_id, cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Shopping list aggregate

    fn shopping_list(&self, user_id: &str) -> Result<Vec<ShoppingListEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT i.name, i.measurement_unit, SUM(ri.amount)
             FROM recipe_ingredients ri
             JOIN ingredients i ON i.id = ri.ingredient_id
             JOIN shopping_cart sc ON sc.recipe_id = ri.recipe_id
             WHERE sc.user_id = ?1
             GROUP BY i.name, i.measurement_unit
             ORDER BY i.name, i.measurement_unit",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ShoppingListEntry {
                name: row.get(0)?,
                measurement_unit: row.get(1)?,
                total_amount: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Prefix-match pattern with LIKE metacharacters neutralized, so a
/// user-supplied "100%" matches the literal string.
fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn insert_ingredient_lines(
    tx: &rusqlite::Transaction<'_>,
    recipe_id: &str,
    lines: &[IngredientLine],
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
    )?;
    for line in lines {
        stmt.execute(params![recipe_id, line.ingredient_id, line.amount])?;
    }
    Ok(())
}
