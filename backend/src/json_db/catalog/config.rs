// FICHIER : backend/src/json_db/catalog/config.rs

use crate::json_db::engine::DatastoreOptions;
use crate::json_db::schema::SchemaSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Section `persistence` de la configuration : une entrée par collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default)]
    pub catalog: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    /// `index.json` + `schema.json`, réécrits en entier.
    FlatFile,
    /// Journal du moteur embarqué.
    Embedded,
    /// Documents fournis par la configuration, jamais écrits sur disque.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub collection_name: String,
    #[serde(default)]
    pub schema: Option<SchemaSource>,
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub mode: Option<StorageMode>,
    #[serde(default)]
    pub filename: Option<PathBuf>,
    #[serde(default)]
    pub autoload: bool,
    #[serde(default)]
    pub in_memory_only: bool,
    #[serde(default)]
    pub timestamp_data: bool,
    #[serde(default)]
    pub corrupt_alert_threshold: Option<f64>,
    /// Jeu initial du mode `memory`.
    #[serde(default)]
    pub documents: Vec<Value>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            collection_name: name.into(),
            schema: None,
            base_path: None,
            mode: None,
            filename: None,
            autoload: false,
            in_memory_only: false,
            timestamp_data: false,
            corrupt_alert_threshold: None,
            documents: Vec::new(),
        }
    }

    /// Mode explicite, sinon `embedded` dès qu'un fichier journal ou
    /// `inMemoryOnly` est déclaré, sinon `flatFile`.
    pub fn resolved_mode(&self) -> StorageMode {
        match self.mode {
            Some(mode) => mode,
            None if self.filename.is_some() || self.in_memory_only => StorageMode::Embedded,
            None => StorageMode::FlatFile,
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.base_path.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Options du moteur ; le journal est rattaché au `basePath`, et à défaut
    /// de `filename` vaut `<nom en minuscules>.db`.
    pub fn datastore_options(&self) -> DatastoreOptions {
        let filename = self
            .filename
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.db", self.collection_name.to_lowercase())));
        let defaults = DatastoreOptions::default();
        DatastoreOptions {
            filename: Some(self.base_dir().join(filename)),
            in_memory_only: self.in_memory_only,
            autoload: self.autoload,
            timestamp_data: self.timestamp_data,
            corrupt_alert_threshold: self
                .corrupt_alert_threshold
                .unwrap_or(defaults.corrupt_alert_threshold),
        }
    }
}
