// FICHIER : backend/tests/json_db_suite/concurrency.rs

use crate::init_test_env;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashSet;
use websemble::json_db::collections::Selector;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_are_all_persisted() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let tasks = (0..20).map(|i| {
        let store = product.clone();
        tokio::spawn(async move {
            store
                .insert(json!({ "name": format!("item-{}", i), "price": i + 1 }))
                .await
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap().unwrap();
    }

    let all = product.find_all().await.unwrap();
    assert_eq!(all.len(), 22);
    let ids: HashSet<String> = all.iter().map(|d| d["id"].to_string()).collect();
    assert_eq!(ids.len(), 22);

    let on_disk: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(env.product_index_path()).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 22);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_snapshots_during_writes() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    let writer = {
        let store = product.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                store
                    .update_partially(Selector::Id(json!(2)), json!({ "price": 100 + i }))
                    .await
                    .unwrap();
            }
        })
    };

    for _ in 0..10 {
        let docs = product.find_all().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0]["price"].as_f64().unwrap() > 0.0);
    }
    writer.await.unwrap();

    let final_doc = product.find_by_id(&json!(2)).await.unwrap();
    assert_eq!(final_doc["price"], 109);
    assert_eq!(final_doc["name"], "An ice sculpture");
}

#[tokio::test]
async fn concurrent_first_access_reads_storage_once() {
    let env = init_test_env().await;
    let catalog = env.product_catalog_instance().await;
    let product = catalog.get_collection("product").unwrap();

    // Le fichier est retiré après le premier chargement : toute relecture échouerait.
    let first = join_all((0..8).map(|_| product.find_all())).await;
    std::fs::remove_file(env.product_index_path()).unwrap();
    let second = join_all((0..8).map(|_| product.find_all())).await;

    for result in first.into_iter().chain(second) {
        assert_eq!(result.unwrap().len(), 2);
    }
}
