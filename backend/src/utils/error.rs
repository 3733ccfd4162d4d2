// FICHIER : backend/src/utils/error.rs

use crate::json_db::schema::ValidationReport;
use serde::Serialize;
use serde_json::{json, Value};
use std::io;

/// Type de résultat standard du backend.
pub type Result<T> = std::result::Result<T, AppError>;

/// Famille d'erreur, telle que vue par la couche de traitement des requêtes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    Persistence,
    Internal,
}

/// Enumération centrale des erreurs du backend.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Erreur de configuration : {0}")]
    Config(String),

    #[error("Erreur de validation : {0}")]
    Validation(ValidationReport),

    #[error("Introuvable : {0}")]
    NotFound(String),

    #[error("Erreur de persistance : {0}")]
    Persistence(String),

    #[error("Erreur d'entrée/sortie : {0}")]
    Io(#[from] io::Error),

    #[error("Erreur de sérialisation : {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erreur Système : {0}")]
    System(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) => ErrorKind::Configuration,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Persistence(_) | AppError::Io(_) | AppError::Serialization(_) => {
                ErrorKind::Persistence
            }
            AppError::System(_) => ErrorKind::Internal,
        }
    }

    /// Code de statut renvoyé au client par le gestionnaire de requêtes.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Configuration | ErrorKind::Persistence | ErrorKind::Internal => 500,
        }
    }

    /// Rapport de validation, si l'erreur en porte un.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            AppError::Validation(report) => Some(report),
            _ => None,
        }
    }

    /// Corps structuré `{kind, message, errors?}` pour l'enveloppe de réponse.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let (Some(report), Some(obj)) = (self.validation_report(), body.as_object_mut()) {
            obj.insert("errors".to_string(), json!(report.errors));
        }
        body
    }
}

/// Journalise une erreur au point où elle est levée (utilisé par `raise_error!`).
/// Les erreurs « client » (validation, introuvable) restent au niveau `warn`.
pub fn log_error(err: &AppError, context: Option<&Value>) {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::NotFound => {
            tracing::warn!(kind = ?err.kind(), context = ?context, "{}", err)
        }
        _ => tracing::error!(kind = ?err.kind(), context = ?context, "{}", err),
    }
}

// Le frontend reçoit l'erreur sous forme de simple chaîne.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

// Permet de faire : return Err("Mon erreur".into());
impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::System(anyhow::anyhow!(s))
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::System(anyhow::anyhow!(s.to_string()))
    }
}
