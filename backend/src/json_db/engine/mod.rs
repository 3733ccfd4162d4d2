//! Moteur embarqué mono-fichier : journal en ajout seul (une ligne JSON par
//! écriture), rejoué au chargement puis compacté.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod datastore;
pub mod persistence;

pub use datastore::Datastore;
pub use persistence::LogFile;

/// Champ identité des documents du moteur.
pub const ID_FIELD: &str = "_id";
/// Marqueur des lignes de suppression dans le journal.
pub const DELETED_FLAG: &str = "$$deleted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreOptions {
    /// Fichier journal. Absent : base purement en mémoire.
    #[serde(default)]
    pub filename: Option<PathBuf>,
    #[serde(default)]
    pub in_memory_only: bool,
    /// Charge au premier accès au lieu d'exiger `load_database()`.
    #[serde(default)]
    pub autoload: bool,
    /// Ajoute `createdAt` / `updatedAt` (RFC 3339).
    #[serde(default)]
    pub timestamp_data: bool,
    /// Part maximale de lignes illisibles tolérée au chargement.
    #[serde(default = "default_corrupt_threshold")]
    pub corrupt_alert_threshold: f64,
}

fn default_corrupt_threshold() -> f64 {
    0.1
}

impl Default for DatastoreOptions {
    fn default() -> Self {
        Self {
            filename: None,
            in_memory_only: false,
            autoload: false,
            timestamp_data: false,
            corrupt_alert_threshold: default_corrupt_threshold(),
        }
    }
}

impl DatastoreOptions {
    pub fn persistent(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            in_memory_only: true,
            ..Self::default()
        }
    }

    /// Journal effectif, `None` si la base ne touche pas le disque.
    pub fn log_path(&self) -> Option<&PathBuf> {
        if self.in_memory_only {
            None
        } else {
            self.filename.as_ref()
        }
    }
}
