//! End-to-end API tests. Each test spawns its own server against an isolated
//! temp data directory, so tests can run in parallel.

mod common;

use serde_json::{Value, json};

const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

fn png_data_uri() -> String {
    format!("data:image/png;base64,{TINY_PNG}")
}

async fn create_recipe(
    server: &common::TestServer,
    token: &str,
    name: &str,
    ingredients: Value,
) -> Value {
    let resp = server
        .client
        .post(server.url("/api/v1/recipes"))
        .bearer_auth(token)
        .json(&json!({
            "name": name,
            "image": png_data_uri(),
            "text": "Mix everything and cook.",
            "cooking_time": 30,
            "ingredients": ingredients,
        }))
        .send()
        .await
        .expect("create recipe");
    assert_eq!(resp.status(), 201, "create recipe {name}");
    resp.json().await.expect("parse recipe response")
}

#[tokio::test]
async fn registration_and_login_flow() {
    let server = common::TestServer::start().await;
    let client = &server.client;

    let resp = client
        .post(server.url("/api/v1/users"))
        .json(&json!({
            "email": "alice@example.com",
            "username": "alice",
            "first_name": "Alice",
            "last_name": "Baker",
            "password": "correct-horse",
        }))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password_hash").is_none());

    // Duplicate email is a conflict.
    let resp = client
        .post(server.url("/api/v1/users"))
        .json(&json!({
            "email": "alice@example.com",
            "username": "alice2",
            "first_name": "Alice",
            "last_name": "Baker",
            "password": "correct-horse",
        }))
        .send()
        .await
        .expect("register duplicate");
    assert_eq!(resp.status(), 409);

    // Wrong password gives a uniform 401.
    let resp = client
        .post(server.url("/api/v1/auth/token"))
        .json(&json!({"email": "alice@example.com", "password": "wrong"}))
        .send()
        .await
        .expect("bad login");
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Invalid email or password");

    let resp = client
        .post(server.url("/api/v1/auth/token"))
        .json(&json!({"email": "alice@example.com", "password": "correct-horse"}))
        .send()
        .await
        .expect("login");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("parse");
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let resp = client
        .get(server.url("/api/v1/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("me");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["email"], "alice@example.com");

    // Logout revokes the token.
    let resp = client
        .delete(server.url("/api/v1/auth/token"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("logout");
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(server.url("/api/v1/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("me after logout");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn recipe_crud_and_validation() {
    let server = common::TestServer::start().await;
    let client = &server.client;

    let flour = server.create_ingredient("flour", "g").await;
    let sugar = server.create_ingredient("sugar", "g").await;

    let (_, alice) = server.register_and_login("alice", "correct-horse").await;
    let (_, bob) = server.register_and_login("bob", "correct-horse").await;

    // Duplicate ingredient lines are rejected up front.
    let resp = client
        .post(server.url("/api/v1/recipes"))
        .bearer_auth(&alice)
        .json(&json!({
            "name": "Bread",
            "image": png_data_uri(),
            "text": "Knead and bake.",
            "cooking_time": 90,
            "ingredients": [
                {"id": flour, "amount": 500},
                {"id": flour, "amount": 100},
            ],
        }))
        .send()
        .await
        .expect("duplicate lines");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Ingredients must not repeat");

    // Out-of-bounds amount names the bound.
    let resp = client
        .post(server.url("/api/v1/recipes"))
        .bearer_auth(&alice)
        .json(&json!({
            "name": "Bread",
            "image": png_data_uri(),
            "text": "Knead and bake.",
            "cooking_time": 90,
            "ingredients": [{"id": flour, "amount": 0}],
        }))
        .send()
        .await
        .expect("zero amount");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Ingredient amount must be at least 1");

    // Unknown catalog id fails without creating anything.
    let resp = client
        .post(server.url("/api/v1/recipes"))
        .bearer_auth(&alice)
        .json(&json!({
            "name": "Bread",
            "image": png_data_uri(),
            "text": "Knead and bake.",
            "cooking_time": 90,
            "ingredients": [{"id": "no-such-id", "amount": 1}],
        }))
        .send()
        .await
        .expect("unknown ingredient");
    assert_eq!(resp.status(), 400);

    let body = create_recipe(
        &server,
        &alice,
        "Bread",
        json!([{"id": flour, "amount": 500}, {"id": sugar, "amount": 20}]),
    )
    .await;
    let recipe_id = body["data"]["id"].as_str().expect("recipe id").to_string();
    assert_eq!(body["data"]["author"]["username"], "alice");
    assert_eq!(body["data"]["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["is_favorited"], false);

    // Anonymous read works and shows viewer flags as false.
    let resp = client
        .get(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .send()
        .await
        .expect("anonymous read");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["is_favorited"], false);
    assert_eq!(body["data"]["is_in_shopping_cart"], false);
    let image = body["data"]["image"].as_str().expect("image url");
    assert!(image.starts_with("/media/"), "got image url {image}");

    // The stored image is served back.
    let resp = client
        .get(server.url(image))
        .send()
        .await
        .expect("fetch image");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );

    // Shareable link resolves against the request host.
    let resp = client
        .get(server.url(&format!("/api/v1/recipes/{recipe_id}/get-link")))
        .send()
        .await
        .expect("get link");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(
        body["data"]["short-link"],
        format!("{}/api/v1/recipes/{recipe_id}", server.base_url)
    );

    let resp = client
        .get(server.url("/api/v1/recipes/no-such-recipe/get-link"))
        .send()
        .await
        .expect("get link for missing recipe");
    assert_eq!(resp.status(), 404);

    // Only the author may modify.
    let resp = client
        .patch(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .bearer_auth(&bob)
        .json(&json!({"name": "Stolen bread"}))
        .send()
        .await
        .expect("non-author patch");
    assert_eq!(resp.status(), 403);

    // Updating with a new ingredient set replaces the old set entirely.
    let resp = client
        .patch(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .bearer_auth(&alice)
        .json(&json!({
            "name": "Sourdough",
            "ingredients": [{"id": flour, "amount": 600}],
        }))
        .send()
        .await
        .expect("author patch");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["name"], "Sourdough");
    let lines = body["data"]["ingredients"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], "flour");
    assert_eq!(lines[0]["amount"], 600);

    // Partial update without ingredients leaves the set alone.
    let resp = client
        .patch(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .bearer_auth(&alice)
        .json(&json!({"cooking_time": 120}))
        .send()
        .await
        .expect("partial patch");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["ingredients"].as_array().unwrap().len(), 1);

    let resp = client
        .delete(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("non-author delete");
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("author delete");
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(server.url(&format!("/api/v1/recipes/{recipe_id}")))
        .send()
        .await
        .expect("read deleted");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn relations_and_shopping_list() {
    let server = common::TestServer::start().await;
    let client = &server.client;

    let flour = server.create_ingredient("flour", "g").await;
    let sugar = server.create_ingredient("sugar", "g").await;
    let milk = server.create_ingredient("milk", "ml").await;

    let (_, alice) = server.register_and_login("alice", "correct-horse").await;

    let bread = create_recipe(
        &server,
        &alice,
        "Bread",
        json!([{"id": flour, "amount": 200}, {"id": sugar, "amount": 50}]),
    )
    .await;
    let bread_id = bread["data"]["id"].as_str().unwrap().to_string();

    let cake = create_recipe(
        &server,
        &alice,
        "Cake",
        json!([{"id": flour, "amount": 100}, {"id": milk, "amount": 250}]),
    )
    .await;
    let cake_id = cake["data"]["id"].as_str().unwrap().to_string();

    // Favorite: first add created, second add conflicts.
    let resp = client
        .post(server.url(&format!("/api/v1/recipes/{bread_id}/favorite")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("favorite");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["name"], "Bread");

    let resp = client
        .post(server.url(&format!("/api/v1/recipes/{bread_id}/favorite")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("favorite again");
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Recipe is already in favorites");

    // Removing something never added is a 404.
    let resp = client
        .delete(server.url(&format!("/api/v1/recipes/{cake_id}/favorite")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("remove missing favorite");
    assert_eq!(resp.status(), 404);

    // The favorite does not leak into the cart.
    let resp = client
        .delete(server.url(&format!("/api/v1/recipes/{bread_id}/shopping_cart")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("remove from empty cart");
    assert_eq!(resp.status(), 404);

    for id in [&bread_id, &cake_id] {
        let resp = client
            .post(server.url(&format!("/api/v1/recipes/{id}/shopping_cart")))
            .bearer_auth(&alice)
            .send()
            .await
            .expect("add to cart");
        assert_eq!(resp.status(), 201);
    }

    // Viewer flags reflect both sets.
    let resp = client
        .get(server.url(&format!("/api/v1/recipes/{bread_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("read with flags");
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["is_favorited"], true);
    assert_eq!(body["data"]["is_in_shopping_cart"], true);

    // Filtered listing.
    let resp = client
        .get(server.url("/api/v1/recipes?is_favorited=true"))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("list favorited");
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Aggregated export: amounts summed per (name, unit), alphabetical order.
    let resp = client
        .get(server.url("/api/v1/recipes/download_shopping_cart"))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("download shopping cart");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        resp.headers()["content-disposition"].to_str().unwrap(),
        "attachment; filename=\"shopping_list.txt\""
    );
    let text = resp.text().await.expect("body");
    assert_eq!(
        text,
        "Список покупок:\n\n- flour (g) - 300\n- milk (ml) - 250\n- sugar (g) - 50\n"
    );
}

#[tokio::test]
async fn subscriptions() {
    let server = common::TestServer::start().await;
    let client = &server.client;

    let flour = server.create_ingredient("flour", "g").await;

    let (alice_id, alice) = server.register_and_login("alice", "correct-horse").await;
    let (bob_id, bob) = server.register_and_login("bob", "correct-horse").await;

    for name in ["Bread", "Cake", "Pie", "Soup"] {
        create_recipe(&server, &bob, name, json!([{"id": flour, "amount": 100}])).await;
    }

    // Subscribing to yourself is rejected outright.
    let resp = client
        .post(server.url(&format!("/api/v1/users/{alice_id}/subscribe")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("self subscribe");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Cannot subscribe to yourself");

    let resp = client
        .post(server.url(&format!("/api/v1/users/{bob_id}/subscribe")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("subscribe");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["is_subscribed"], true);
    assert_eq!(body["data"]["recipes_count"], 4);
    // Recipe preview is capped by default.
    assert_eq!(body["data"]["recipes"].as_array().unwrap().len(), 3);

    let resp = client
        .post(server.url(&format!("/api/v1/users/{bob_id}/subscribe")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("subscribe again");
    assert_eq!(resp.status(), 409);

    // recipes_limit widens the preview.
    let resp = client
        .get(server.url("/api/v1/users/subscriptions?recipes_limit=10"))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("list subscriptions");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    let subs = body["data"].as_array().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["recipes"].as_array().unwrap().len(), 4);

    // Viewer-relative flag on the profile endpoint.
    let resp = client
        .get(server.url(&format!("/api/v1/users/{bob_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("view author");
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["is_subscribed"], true);

    // Bob is not subscribed back.
    let resp = client
        .get(server.url(&format!("/api/v1/users/{alice_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("view from other side");
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["is_subscribed"], false);

    let resp = client
        .delete(server.url(&format!("/api/v1/users/{bob_id}/subscribe")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("unsubscribe");
    assert_eq!(resp.status(), 204);

    let resp = client
        .delete(server.url(&format!("/api/v1/users/{bob_id}/subscribe")))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("unsubscribe again");
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["error"], "Not subscribed to this author");
}

#[tokio::test]
async fn admin_catalog_and_auth_boundaries() {
    let server = common::TestServer::start().await;
    let client = &server.client;

    let (_, alice) = server.register_and_login("alice", "correct-horse").await;

    // User tokens cannot reach admin routes.
    let resp = client
        .post(server.url("/api/v1/admin/ingredients"))
        .bearer_auth(&alice)
        .json(&json!({"name": "flour", "measurement_unit": "g"}))
        .send()
        .await
        .expect("admin as user");
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(server.url("/api/v1/admin/ingredients"))
        .bearer_auth(&server.admin_token)
        .json(&json!({"name": "flour", "measurement_unit": "g"}))
        .send()
        .await
        .expect("create ingredient");
    assert_eq!(resp.status(), 201);

    // Same (name, unit) pair conflicts; same name with a new unit does not.
    let resp = client
        .post(server.url("/api/v1/admin/ingredients"))
        .bearer_auth(&server.admin_token)
        .json(&json!({"name": "flour", "measurement_unit": "g"}))
        .send()
        .await
        .expect("duplicate ingredient");
    assert_eq!(resp.status(), 409);

    let resp = client
        .post(server.url("/api/v1/admin/ingredients"))
        .bearer_auth(&server.admin_token)
        .json(&json!({"name": "flour", "measurement_unit": "kg"}))
        .send()
        .await
        .expect("same name new unit");
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(server.url("/api/v1/admin/ingredients/import"))
        .bearer_auth(&server.admin_token)
        .json(&json!({"ingredients": [
            {"name": "flour", "measurement_unit": "g"},
            {"name": "salt", "measurement_unit": "g"},
            {"name": "pepper", "measurement_unit": "g"},
        ]}))
        .send()
        .await
        .expect("bulk import");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(body["data"]["skipped"], 1);

    // Catalog reads are public, with optional prefix search.
    let resp = client
        .get(server.url("/api/v1/ingredients?name=fl"))
        .send()
        .await
        .expect("search ingredients");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("parse");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Garbage tokens are a 401, not a silent anonymous fallback.
    let resp = client
        .get(server.url("/api/v1/recipes"))
        .bearer_auth("ladle_bogus_token")
        .send()
        .await
        .expect("bogus token");
    assert_eq!(resp.status(), 401);
}
