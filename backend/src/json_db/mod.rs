// FICHIER : backend/src/json_db/mod.rs

pub mod catalog;
pub mod collections;
pub mod engine;
pub mod query;
pub mod schema;
pub mod storage;

// ============================================================================
// UTILITAIRES DE TEST (Intégrés)
// Ce module n'est compilé que lors de l'exécution des tests (cargo test)
// ============================================================================
#[cfg(test)]
pub mod test_utils {
    use serde_json::Value;
    use std::sync::Once;

    static INIT: Once = Once::new();

    const PRODUCT_SCHEMA: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/mockdata/product/schema.json"
    ));
    const PRODUCT_INDEX: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/mockdata/product/index.json"
    ));

    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("info")
                .with_test_writer()
                .try_init();
        });
    }

    pub fn product_schema() -> Value {
        serde_json::from_str(PRODUCT_SCHEMA).expect("schema produit valide")
    }

    /// Produits 2 (An ice sculpture) et 3 (A blue mouse).
    pub fn product_documents() -> Vec<Value> {
        serde_json::from_str(PRODUCT_INDEX).expect("index produit valide")
    }
}
