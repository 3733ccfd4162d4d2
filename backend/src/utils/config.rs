// FICHIER : backend/src/utils/config.rs

use crate::json_db::catalog::CatalogConfig;
use crate::raise_error;
use crate::utils::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Variables d'environnement reconnues (surcharges du fichier).
pub const ENV_DATA_ROOT: &str = "WEBSEMBLE_DATA_ROOT";
pub const ENV_LOG_LEVEL: &str = "WEBSEMBLE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "WEBSEMBLE_LOG_DIR";

/// Configuration du backend : racine des données, journalisation et catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dossier des journaux JSON. Absent : console uniquement.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub persistence: CatalogConfig,
}

// --- HELPERS SERDE ---

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Configuration minimale, sans collection déclarée.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            log_level: default_log_level(),
            log_dir: None,
            persistence: CatalogConfig::default(),
        }
    }

    /// Charge le fichier JSON, applique les surcharges d'environnement et
    /// résout `dataRoot` relativement au dossier du fichier.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => raise_error!(
                AppError::Config(format!("Lecture impossible de {} : {}", path.display(), e)),
                context = json!({ "path": path.to_string_lossy() })
            ),
        };

        let mut config: AppConfig = match serde_json::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => raise_error!(
                AppError::Config(format!("Configuration invalide {} : {}", path.display(), e)),
                context = json!({ "path": path.to_string_lossy() })
            ),
        };

        if config.data_root.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_root = parent.join(&config.data_root);
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = env::var(ENV_DATA_ROOT) {
            if !root.trim().is_empty() {
                self.data_root = PathBuf::from(root);
            }
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            if !level.trim().is_empty() {
                self.log_level = level;
            }
        }
        if let Ok(dir) = env::var(ENV_LOG_DIR) {
            if !dir.trim().is_empty() {
                self.log_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// Catalogue prêt à l'emploi : chaque `basePath` absent ou relatif est
    /// rattaché à `dataRoot`.
    pub fn catalog_config(&self) -> CatalogConfig {
        let mut catalog = self.persistence.clone();
        for entry in &mut catalog.catalog {
            entry.base_path = Some(match entry.base_path.take() {
                Some(p) if p.is_absolute() => p,
                Some(p) => self.data_root.join(p),
                None => self.data_root.clone(),
            });
        }
        catalog
    }
}
