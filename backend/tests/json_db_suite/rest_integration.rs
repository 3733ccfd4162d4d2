// FICHIER : backend/tests/json_db_suite/rest_integration.rs

use crate::init_test_env;
use serde_json::json;
use websemble::commands::{Method, RestService};
use websemble::utils::Arc;

#[tokio::test]
async fn rest_round_trip_over_flat_file_collection() {
    let env = init_test_env().await;
    let rest = RestService::new(Arc::new(env.product_catalog_instance().await));

    let created = rest
        .handle(
            Method::Post,
            "/product",
            Some(json!({ "name": "TNT", "price": 42.99, "tags": ["explosive"] })),
        )
        .await;
    assert_eq!(created.status, 201);
    let id = created.body["id"].as_str().unwrap().to_string();

    let fetched = rest.handle_get(&format!("/product/{}", id)).await;
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.body["name"], "TNT");
    assert_eq!(fetched.request.url, format!("/product/{}", id));

    let by_tag = rest.handle_get("/product?tags=explosive").await;
    assert_eq!(by_tag.body.as_array().unwrap().len(), 1);

    let by_price = rest.handle_get("/product?price=25.5").await;
    assert_eq!(by_price.body[0]["name"], "A blue mouse");

    let bad_patch = rest
        .handle_patch(&format!("/product/{}", id), json!({ "tags": [] }))
        .await;
    assert_eq!(bad_patch.status, 422);
    assert_eq!(bad_patch.body["errors"][0]["path"], "/tags");

    let removed = rest.handle_delete(&format!("/product/{}", id)).await;
    assert_eq!(removed.status, 200);
    assert_eq!(rest.handle_get(&format!("/product/{}", id)).await.status, 404);
}

#[tokio::test]
async fn rest_envelope_serializes_for_the_frontend() {
    let env = init_test_env().await;
    let rest = RestService::new(Arc::new(env.product_catalog_instance().await));

    let response = rest.handle_get("/product/2").await;
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["request"], json!({ "url": "/product/2", "method": "GET" }));
    assert_eq!(wire["status"], 200);
    assert_eq!(wire["body"]["id"], 2);

    let unknown = serde_json::to_value(rest.handle_get("/ghost").await).unwrap();
    assert_eq!(unknown["status"], 404);
    assert_eq!(unknown["body"]["kind"], "notFound");
}
