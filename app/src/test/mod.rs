//! Guarded with `#[cfg(test)]` from `lib.rs`. Drives the full actix app
//! against the in-memory store.

use actix_web::http::header::AUTHORIZATION;
use actix_web::http::{Method, StatusCode};
use actix_web::test::{call_service, init_service, read_body_json, TestRequest};
use maplit::btreeset;
use serde_json::{json, Value};

use infra::memory::MemoryConnectionManager;

use crate::drinks::{
    DrinkForm, DELETE_DRINKS, GET_DRINKS_DETAIL, MAX_BODY_BYTES, PATCH_DRINKS, POST_DRINKS,
};
use crate::services::{Commandable, CreateDrink};
use crate::CoffeeShop;


use self::junk_drawer::{request_with, TokenBuilder};

type Shop = CoffeeShop<MemoryConnectionManager>;

async fn call(shop: &Shop, req: TestRequest) -> (StatusCode, Value) {
    let app = init_service(shop.app()).await;
    let resp = call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = read_body_json(resp).await;
    (status, body)
}

fn latte() -> Value {
    json!({
        "title": "Latte",
        "recipe": [
            {"name": "espresso", "color": "brown", "parts": 1},
            {"name": "milk", "color": "white", "parts": 3}
        ]
    })
}

fn seed(shop: &Shop, body: Value) -> i32 {
    let form: DrinkForm = serde_json::from_value(body).expect("form");
    shop.catalog()
        .execute(CreateDrink(form))
        .expect("seed drink")
        .id
}

fn envelope(status: u16, message: &str) -> Value {
    json!({"success": false, "error": status, "message": message})
}

#[actix_web::test]
async fn empty_catalog_is_not_found() {
    let shop = junk_drawer::shop();

    let (status, body) = call(&shop, TestRequest::get().uri("/drinks")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, envelope(404, "Resource not found"));

    let (status, body) = call(&shop, request_with(&[GET_DRINKS_DETAIL]).uri("/drinks-detail")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, envelope(404, "Resource not found"));
}

#[actix_web::test]
async fn public_list_hides_parts() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());

    let (status, body) = call(&shop, TestRequest::get().uri("/drinks")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "drinks": [{
                "id": id,
                "title": "Latte",
                "recipe": [
                    {"name": "espresso", "color": "brown"},
                    {"name": "milk", "color": "white"}
                ]
            }]
        })
    );
}

#[actix_web::test]
async fn detail_needs_its_permission() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());

    let (status, body) = call(&shop, TestRequest::get().uri("/drinks-detail")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, envelope(401, "Authorization header is expected."));

    let (status, body) = call(&shop, request_with(&[POST_DRINKS]).uri("/drinks-detail")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, envelope(403, "Permission not found."));

    let (status, body) = call(&shop, request_with(&[GET_DRINKS_DETAIL]).uri("/drinks-detail")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "drinks": [{
                "id": id,
                "title": "Latte",
                "recipe": latte()["recipe"]
            }]
        })
    );
}

#[actix_web::test]
async fn malformed_headers_are_unauthorized() {
    let shop = junk_drawer::shop();
    seed(&shop, latte());
    let token = TokenBuilder::with_permissions(&[GET_DRINKS_DETAIL]).sign();

    for header in &[
        "Bearer".to_string(),
        format!("Token {}", token),
        format!("Bearer {} {}", token, token),
        "Bearer not-a-jwt".to_string(),
    ] {
        let req = TestRequest::get()
            .uri("/drinks-detail")
            .insert_header((AUTHORIZATION, header.as_str()));
        let (status, body) = call(&shop, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{:?}", header);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!(401));
    }
}

#[actix_web::test]
async fn expired_tokens_are_unauthorized_even_with_permission() {
    let shop = junk_drawer::shop();
    seed(&shop, latte());
    let token = TokenBuilder::with_permissions(&[GET_DRINKS_DETAIL])
        .claim("exp", json!(chrono::Utc::now().timestamp() - 3600))
        .bearer();

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header((AUTHORIZATION, token));
    let (status, body) = call(&shop, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, envelope(401, "Token expired."));
}

#[actix_web::test]
async fn create_then_read_back() {
    let shop = junk_drawer::shop();

    let req = request_with(&[POST_DRINKS])
        .method(Method::POST)
        .uri("/drinks")
        .set_json(latte());
    let (status, created) = call(&shop, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], json!(true));
    let drinks = created["drinks"].as_array().expect("drinks");
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0]["title"], json!("Latte"));
    assert_eq!(drinks[0]["recipe"], latte()["recipe"]);

    let (status, listed) = call(&shop, request_with(&[GET_DRINKS_DETAIL]).uri("/drinks-detail")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["drinks"], created["drinks"]);
}

#[actix_web::test]
async fn create_needs_post_permission_before_reading_the_body() {
    let shop = junk_drawer::shop();

    let req = request_with(&[GET_DRINKS_DETAIL, PATCH_DRINKS, DELETE_DRINKS])
        .method(Method::POST)
        .uri("/drinks")
        .set_json(latte());
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, envelope(403, "Permission not found."));

    let req = TestRequest::post()
        .uri("/drinks")
        .set_payload("not json at all");
    let (status, _) = call(&shop, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&shop, TestRequest::get().uri("/drinks")).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "nothing should have been created");
}

#[actix_web::test]
async fn oversized_bodies_are_refused_after_the_guard() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());
    let huge = format!(
        r#"{{"title": "{}", "recipe": []}}"#,
        "x".repeat(MAX_BODY_BYTES + 1)
    );

    let req = TestRequest::post().uri("/drinks").set_payload(huge.clone());
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, envelope(401, "Authorization header is expected."));

    let req = request_with(&[GET_DRINKS_DETAIL])
        .method(Method::PATCH)
        .uri(&format!("/drinks/{}", id))
        .set_payload(huge.clone());
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, envelope(403, "Permission not found."));

    let req = request_with(&[POST_DRINKS])
        .method(Method::POST)
        .uri("/drinks")
        .set_payload(huge);
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, envelope(422, "Unprocessable"));
}

#[actix_web::test]
async fn invalid_drinks_are_unprocessable() {
    let shop = junk_drawer::shop();
    seed(&shop, latte());

    for body in &[
        latte(),
        json!({"recipe": latte()["recipe"]}),
        json!({"title": "Espresso"}),
        json!({"title": "Espresso", "recipe": [{"name": "espresso", "color": "brown"}]}),
        json!({"title": "Espresso", "recipe": "espresso"}),
    ] {
        let req = request_with(&[POST_DRINKS])
            .method(Method::POST)
            .uri("/drinks")
            .set_json(body);
        let (status, resp) = call(&shop, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
        assert_eq!(resp, envelope(422, "Unprocessable"));
    }

    let req = request_with(&[POST_DRINKS])
        .method(Method::POST)
        .uri("/drinks")
        .set_payload("{\"title\": ");
    let (status, _) = call(&shop, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn update_replaces_title_and_recipe() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());
    let flat_white = json!({
        "title": "Flat white",
        "recipe": {"name": "milk", "color": "white", "parts": 2}
    });

    let req = request_with(&[PATCH_DRINKS])
        .method(Method::PATCH)
        .uri(&format!("/drinks/{}", id))
        .set_json(&flat_white);
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "drinks": [{"id": id, "title": "Flat white", "recipe": flat_white["recipe"]}]
        })
    );

    let (_, listed) = call(&shop, TestRequest::get().uri("/drinks")).await;
    assert_eq!(listed["drinks"][0]["title"], json!("Flat white"));
    assert_eq!(
        listed["drinks"][0]["recipe"],
        json!([{"name": "milk", "color": "white"}])
    );
}

#[actix_web::test]
async fn update_without_a_recipe_is_unprocessable_and_changes_nothing() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());

    let req = request_with(&[PATCH_DRINKS])
        .method(Method::PATCH)
        .uri(&format!("/drinks/{}", id))
        .set_json(json!({"title": "Cortado"}));
    let (status, _) = call(&shop, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listed) = call(&shop, TestRequest::get().uri("/drinks")).await;
    assert_eq!(listed["drinks"][0]["title"], json!("Latte"));
}

#[actix_web::test]
async fn missing_drinks_are_not_found_not_unprocessable() {
    let shop = junk_drawer::shop();
    seed(&shop, latte());

    for uri in &["/drinks/999", "/drinks/latte", "/drinks/-1"] {
        // A body the store would refuse must not mask the absence.
        let req = request_with(&[PATCH_DRINKS])
            .method(Method::PATCH)
            .uri(uri)
            .set_json(json!({}));
        let (status, body) = call(&shop, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "PATCH {}", uri);
        assert_eq!(body, envelope(404, "Resource not found"));

        let req = request_with(&[DELETE_DRINKS]).method(Method::DELETE).uri(uri);
        let (status, _) = call(&shop, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {}", uri);
    }
}

#[actix_web::test]
async fn delete_is_final() {
    let shop = junk_drawer::shop();
    let id = seed(&shop, latte());
    let uri = format!("/drinks/{}", id);

    let req = request_with(&[PATCH_DRINKS]).method(Method::DELETE).uri(&uri);
    let (status, _) = call(&shop, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = request_with(&[DELETE_DRINKS]).method(Method::DELETE).uri(&uri);
    let (status, body) = call(&shop, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "delete": id}));

    let req = request_with(&[DELETE_DRINKS]).method(Method::DELETE).uri(&uri);
    let (status, _) = call(&shop, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let replacement = seed(&shop, latte());
    assert_ne!(replacement, id, "ids are not reused");
}

#[actix_web::test]
async fn unknown_routes_and_verbs_use_the_envelope() {
    let shop = junk_drawer::shop();

    let (status, body) = call(&shop, TestRequest::get().uri("/coffee")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, envelope(404, "Resource not found"));

    let cases = vec![
        (Method::PUT, "/drinks"),
        (Method::DELETE, "/drinks"),
        (Method::POST, "/drinks-detail"),
        (Method::GET, "/drinks/1"),
        (Method::POST, "/drinks/1"),
    ];
    for (method, uri) in cases {
        let req = TestRequest::default().method(method.clone()).uri(uri);
        let (status, body) = call(&shop, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        assert_eq!(body, envelope(405, "Method not allowed"));
    }
}

#[actix_web::test]
async fn listing_is_ordered_by_id() {
    let shop = junk_drawer::shop();
    for title in &["Mocha", "Americano", "Cappuccino"] {
        seed(
            &shop,
            json!({"title": title, "recipe": {"name": "espresso", "color": "brown", "parts": 1}}),
        );
    }

    let (_, body) = call(&shop, TestRequest::get().uri("/drinks")).await;
    let drinks = body["drinks"].as_array().expect("drinks");
    let ids = drinks
        .iter()
        .map(|d| d["id"].as_i64().expect("id"))
        .collect::<Vec<_>>();
    let titles = drinks
        .iter()
        .map(|d| d["title"].as_str().expect("title"))
        .collect::<std::collections::BTreeSet<_>>();

    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(titles, btreeset! {"Americano", "Cappuccino", "Mocha"});
}
