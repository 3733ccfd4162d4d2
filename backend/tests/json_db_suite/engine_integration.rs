// FICHIER : backend/tests/json_db_suite/engine_integration.rs

use crate::init_test_env;
use serde_json::json;
use websemble::json_db::catalog::{Catalog, CatalogConfig, CollectionConfig, StorageMode};
use websemble::json_db::collections::{Selector, WriteOutcome};
use websemble::json_db::schema::SchemaSource;
use websemble::utils::{fs::PathBuf, AppError};

fn orders_config(base: PathBuf) -> CatalogConfig {
    let mut entry = CollectionConfig::new("orders");
    entry.base_path = Some(base);
    entry.filename = Some(PathBuf::from("orders.db"));
    entry.timestamp_data = true;
    entry.schema = Some(SchemaSource::Inline(json!({
        "type": "object",
        "properties": {
            "item": { "type": "string" },
            "qty": { "type": "integer", "minimum": 1 }
        },
        "required": ["item", "qty"]
    })));
    CatalogConfig {
        catalog: vec![entry],
    }
}

#[tokio::test]
async fn embedded_collection_survives_restart() {
    let env = init_test_env().await;
    let config = orders_config(env.data_root.clone());

    let id = {
        let catalog = Catalog::from_config(&config).await.unwrap();
        let orders = catalog.get_collection("orders").unwrap();
        assert_eq!(orders.identity_field(), "_id");

        let a = orders.insert(json!({ "item": "bolt", "qty": 10 })).await.unwrap();
        orders.insert(json!({ "item": "nut", "qty": 3 })).await.unwrap();
        assert!(a["createdAt"].is_string());

        let outcome = orders
            .update_partially(Selector::Id(a["_id"].clone()), json!({ "qty": 12 }))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Count(1));

        let removed = orders
            .delete(Selector::Query(json!({ "item": "nut" })))
            .await
            .unwrap();
        assert_eq!(removed, WriteOutcome::Count(1));
        a["_id"].clone()
    };

    let catalog = Catalog::from_config(&config).await.unwrap();
    let orders = catalog.get_collection("orders").unwrap();
    let all = orders.find_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["_id"], id);
    assert_eq!(all[0]["qty"], 12);
    assert!(all[0]["updatedAt"].is_string());

    let log = std::fs::read_to_string(env.data_root.join("orders.db")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[tokio::test]
async fn embedded_collection_validates_before_writing() {
    let env = init_test_env().await;
    let catalog = Catalog::from_config(&orders_config(env.data_root.clone()))
        .await
        .unwrap();
    let orders = catalog.get_collection("orders").unwrap();

    let err = orders.insert(json!({ "item": "bolt", "qty": 0 })).await.unwrap_err();
    assert!(err.validation_report().unwrap().has_path("/qty"));
    assert!(orders.find_all().await.unwrap().is_empty());

    let missing = orders
        .update(Selector::Id(json!("absent")), json!({ "item": "x", "qty": 1 }))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn corrupt_log_beyond_threshold_fails_autoload() {
    let env = init_test_env().await;
    std::fs::create_dir_all(&env.data_root).unwrap();
    std::fs::write(
        env.data_root.join("orders.db"),
        "{\"_id\":\"a\",\"item\":\"bolt\",\"qty\":1}\n### illisible\n### illisible\n",
    )
    .unwrap();

    let mut config = orders_config(env.data_root.clone());
    config.catalog[0].autoload = true;
    let err = Catalog::from_config(&config).await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));

    config.catalog[0].corrupt_alert_threshold = Some(0.9);
    let catalog = Catalog::from_config(&config).await.unwrap();
    let orders = catalog.get_collection("orders").unwrap();
    assert_eq!(orders.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn in_memory_engine_never_touches_disk() {
    let env = init_test_env().await;
    let mut entry = CollectionConfig::new("scratch");
    entry.base_path = Some(env.data_root.clone());
    entry.in_memory_only = true;
    assert_eq!(entry.resolved_mode(), StorageMode::Embedded);

    let catalog = Catalog::from_config(&CatalogConfig {
        catalog: vec![entry],
    })
    .await
    .unwrap();
    let scratch = catalog.get_collection("scratch").unwrap();
    scratch.insert(json!({ "k": 1 })).await.unwrap();

    assert_eq!(scratch.find_all().await.unwrap().len(), 1);
    assert!(!env.data_root.join("scratch.db").exists());
}
