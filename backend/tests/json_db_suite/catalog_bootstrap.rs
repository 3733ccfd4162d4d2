// FICHIER : backend/tests/json_db_suite/catalog_bootstrap.rs

use crate::init_test_env;
use serde_json::json;
use websemble::json_db::catalog::StorageMode;
use websemble::utils::{AppConfig, AppError};
use websemble::AppState;

const CONFIG: &str = r#"{
    "dataRoot": "data",
    "persistence": {
        "catalog": [
            { "collectionName": "product", "autoload": true },
            { "collectionName": "orders", "filename": "orders.db",
              "schema": { "type": "object", "required": ["item"] } },
            { "collectionName": "demo", "mode": "memory",
              "schema": "product/schema.json",
              "documents": [{ "id": 1, "name": "demo", "price": 1 }] }
        ]
    }
}"#;

#[tokio::test]
async fn bootstrap_from_config_file() {
    let env = init_test_env().await;
    // dataRoot relatif : résolu par rapport au dossier du fichier
    let path = env._tmp_dir.path().join("websemble.json");
    std::fs::write(&path, CONFIG).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.data_root, env.data_root);
    assert_eq!(
        config.persistence.catalog[1].resolved_mode(),
        StorageMode::Embedded
    );

    let state = AppState::bootstrap(&config).await.unwrap();
    assert_eq!(
        state.catalog.collection_names(),
        vec!["demo", "orders", "product"]
    );

    let product = state.catalog.get_collection("product").unwrap();
    assert_eq!(product.find_all().await.unwrap().len(), 2);

    let demo = state.catalog.get_collection("demo").unwrap();
    assert_eq!(demo.get_schema().await.unwrap()["title"], "Product");
    assert!(demo.insert(json!({ "name": "no price" })).await.is_err());

    let orders = state.catalog.get_collection("orders").unwrap();
    orders.insert(json!({ "item": "bolt" })).await.unwrap();
    assert!(env.data_root.join("orders.db").exists());

    let again = state.catalog.init(Some(&config.catalog_config())).await;
    assert!(matches!(again, Err(AppError::Config(_))));
}

#[tokio::test]
async fn missing_flat_file_artifacts_fail_autoload() {
    let env = init_test_env().await;
    let mut config = AppConfig::with_data_root(env.data_root.join("nowhere"));
    config.persistence = env.product_catalog();
    config.persistence.catalog[0].base_path = None;
    config.persistence.catalog[0].autoload = true;

    let err = AppState::bootstrap(&config).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("index.json"));
}

#[tokio::test]
async fn lazy_collection_fails_on_first_use_only() {
    let env = init_test_env().await;
    let mut config = env.config();
    config.persistence = env.product_catalog();
    config.persistence.catalog[0].collection_name = "ghost".to_string();
    config.persistence.catalog[0].base_path = None;

    let state = AppState::bootstrap(&config).await.unwrap();
    let ghost = state.catalog.get_collection("ghost").unwrap();
    assert!(matches!(ghost.find_all().await, Err(AppError::Config(_))));
}
