// FICHIER : backend/src/json_db/schema/mod.rs

//! Validation de documents contre un schéma JSON (impl. légère, sans lib externe)

use crate::raise_error;
use crate::utils::error::{AppError, Result};
use crate::utils::fs::{self, Path};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub mod validator;
pub use validator::{validate, SchemaValidator};

/// Provenance d'un schéma déclaré dans la configuration : chemin (relatif au
/// `basePath` de la collection) ou objet JSON en ligne.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    Path(String),
    Inline(Value),
}

impl SchemaSource {
    pub async fn load(&self, base_path: &Path) -> Result<Value> {
        match self {
            SchemaSource::Inline(schema) => Ok(schema.clone()),
            SchemaSource::Path(rel) => {
                let path = base_path.join(rel);
                if !fs::exists(&path).await {
                    raise_error!(
                        AppError::Config(format!("Schéma introuvable : {}", path.display())),
                        context = json!({ "path": path.to_string_lossy() })
                    );
                }
                fs::read_json(&path).await
            }
        }
    }
}

/// Une violation de schéma, localisée par un pointeur JSON (`/dimensions/length`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Résultat d'une validation : `valid` est vrai ssi `errors` est vide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_issues(vec![ValidationIssue::new(path, message)])
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "document conforme");
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                let path = if e.path.is_empty() { "/" } else { &e.path };
                format!("{} : {}", path, e.message)
            })
            .collect();
        write!(f, "{}", parts.join(" ; "))
    }
}
