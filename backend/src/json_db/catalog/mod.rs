//! Catalogue : nom de collection -> store configuré

pub mod config;

pub use config::{CatalogConfig, CollectionConfig, StorageMode};

use crate::json_db::collections::{DocumentStore, EngineStore, FlatFileStore};
use crate::json_db::engine::Datastore;
use crate::json_db::storage::{FlatFileAdapter, MemoryAdapter};
use crate::raise_error;
use crate::utils::prelude::*;
use crate::utils::{Arc, AsyncMutex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

type Registry = BTreeMap<String, Arc<dyn DocumentStore>>;

/// Registre des collections, rempli une seule fois par `init` puis en
/// lecture seule. Objet de contexte explicite : il se partage via `Arc`.
#[derive(Debug, Default)]
pub struct Catalog {
    collections: OnceLock<Registry>,
    init_lock: AsyncMutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_config(config: &CatalogConfig) -> Result<Self> {
        let catalog = Self::new();
        catalog.init(Some(config)).await?;
        Ok(catalog)
    }

    pub fn is_initialized(&self) -> bool {
        self.collections.get().is_some()
    }

    /// `None` : sans effet. Une seconde initialisation est refusée. Les
    /// collections `autoload` sont chargées immédiatement.
    pub async fn init(&self, config: Option<&CatalogConfig>) -> Result<()> {
        let Some(config) = config else {
            debug!("Catalogue : init sans configuration ignoré");
            return Ok(());
        };

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            raise_error!(AppError::Config("Catalogue déjà initialisé".to_string()));
        }

        let mut registry = Registry::new();
        for entry in &config.catalog {
            let name = entry.collection_name.trim();
            if name.is_empty() {
                raise_error!(AppError::Config(
                    "collectionName vide dans le catalogue".to_string()
                ));
            }
            if registry.contains_key(name) {
                raise_error!(
                    AppError::Config(format!("Collection {} déclarée deux fois", name)),
                    context = json!({ "collection": name })
                );
            }
            let store = build_store(name, entry).await?;
            registry.insert(name.to_string(), store);
        }

        for entry in config.catalog.iter().filter(|e| e.autoload) {
            if let Some(store) = registry.get(entry.collection_name.trim()) {
                store.ensure_loaded().await?;
            }
        }

        let names: Vec<&String> = registry.keys().collect();
        info!(collections = ?names, "Catalogue initialisé");

        if self.collections.set(registry).is_err() {
            raise_error!(AppError::Config("Catalogue déjà initialisé".to_string()));
        }
        Ok(())
    }

    pub fn get_collection(&self, name: &str) -> Result<Arc<dyn DocumentStore>> {
        match self.collections.get().and_then(|r| r.get(name)) {
            Some(store) => Ok(store.clone()),
            None => raise_error!(AppError::NotFound(format!(
                "Collection {} does not exist",
                name
            ))),
        }
    }

    /// Noms enregistrés, triés.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .get()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }
}

async fn build_store(name: &str, entry: &CollectionConfig) -> Result<Arc<dyn DocumentStore>> {
    let base = entry.base_dir();
    let store: Arc<dyn DocumentStore> = match entry.resolved_mode() {
        StorageMode::FlatFile => {
            let adapter = FlatFileAdapter::new(&base).with_schema(entry.schema.clone());
            Arc::new(FlatFileStore::new(name, Arc::new(adapter)))
        }
        StorageMode::Embedded => {
            let datastore = Datastore::new(entry.datastore_options());
            Arc::new(EngineStore::new(
                name,
                Arc::new(datastore),
                entry.schema.clone(),
                &base,
            ))
        }
        StorageMode::Memory => {
            let schema = match &entry.schema {
                Some(source) => source.load(&base).await?,
                None => json!({}),
            };
            let adapter =
                MemoryAdapter::new().with_collection(name, entry.documents.clone(), schema);
            Arc::new(FlatFileStore::new(name, Arc::new(adapter)))
        }
    };
    debug!(collection = name, mode = ?entry.resolved_mode(), "Store construit");
    Ok(store)
}
