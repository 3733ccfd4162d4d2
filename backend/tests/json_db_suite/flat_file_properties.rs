// FICHIER : backend/tests/json_db_suite/flat_file_properties.rs

use crate::init_test_env;
use serde_json::{json, Value};
use websemble::json_db::collections::Selector;
use websemble::json_db::query::FindOptions;
use websemble::json_db::schema::validate;
use websemble::utils::AppError;

#[tokio::test]
async fn find_all_is_stable_between_reads() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let first = product.find_all().await.unwrap();
    let second = product.find_all().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn insert_round_trip_and_persisted_order() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let tnt = json!({
        "name": "TNT",
        "price": 42.99,
        "tags": ["explosive"],
        "dimensions": { "length": 0.25, "width": 0.25, "height": 0.5 }
    });
    let stored = product.insert(tnt.clone()).await.unwrap();
    let id = stored["id"].clone();

    let mut fetched = product.find_by_id(&id).await.unwrap();
    fetched.as_object_mut().unwrap().remove("id");
    assert_eq!(fetched, tnt);

    // Le fichier contient la séquence complète, dans l'ordre d'insertion
    let on_disk: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(env.product_index_path()).unwrap()).unwrap();
    let ids: Vec<&Value> = on_disk.iter().map(|d| &d["id"]).collect();
    assert_eq!(ids, vec![&json!(2), &json!(3), &id]);
}

#[tokio::test]
async fn invalid_insert_leaves_collection_unchanged() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let before = product.find_all().await.unwrap().len();
    let err = product.insert(json!({ "name": "Panacea" })).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(err.validation_report().unwrap().has_path("/price"));
    assert_eq!(product.find_all().await.unwrap().len(), before);
}

#[tokio::test]
async fn invalid_update_keeps_stored_document() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let before = product.find_by_id(&json!(2)).await.unwrap();
    let result = product
        .update(Selector::Id(json!(2)), json!({ "name": 12, "price": "free" }))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(product.find_by_id(&json!(2)).await.unwrap(), before);
}

#[tokio::test]
async fn partial_update_touches_only_given_fields() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    product
        .update_partially(
            Selector::Id(json!(2)),
            json!({ "name": "An ice sculpture updated" }),
        )
        .await
        .unwrap();

    let doc = product.find_by_id(&json!(2)).await.unwrap();
    assert_eq!(doc["name"], "An ice sculpture updated");
    assert_eq!(doc["price"], json!(12.5));
    assert_eq!(doc["tags"], json!(["cold", "ice"]));
}

#[tokio::test]
async fn delete_then_find_by_id_is_not_found() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    product.delete(Selector::Id(json!(3))).await.unwrap();
    let err = product.find_by_id(&json!(3)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn matcher_scenarios_over_seed_data() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();
    let opts = FindOptions::default();

    let both = product
        .find(Some(&json!({ "name": "An ice sculpture", "price": 12.50 })), &opts)
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0]["id"], 2);

    assert!(product
        .find(Some(&json!({ "name": "X" })), &opts)
        .await
        .unwrap()
        .is_empty());

    let loose = product
        .find(Some(&json!({ "price": "12.50" })), &opts)
        .await
        .unwrap();
    assert_eq!(loose.len(), 1);
    assert_eq!(loose[0]["id"], 2);

    let tagged = product
        .find(Some(&json!({ "tags": "ice" })), &opts)
        .await
        .unwrap();
    assert_eq!(tagged[0]["id"], 2);
}

#[tokio::test]
async fn seed_documents_conform_to_their_schema() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let schema = product.get_schema().await.unwrap();
    for doc in product.find_all().await.unwrap() {
        let report = validate(&schema, &doc);
        assert!(report.valid, "{}", report);
    }
}

#[tokio::test]
async fn drop_empties_collection_on_disk() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    assert!(product.drop_collection().await.unwrap());
    let raw = std::fs::read_to_string(env.product_index_path()).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), json!([]));
}
