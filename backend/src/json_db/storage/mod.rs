// FICHIER : backend/src/json_db/storage/mod.rs

pub mod file_storage;
pub mod memory;

pub use file_storage::FlatFileAdapter;
pub use memory::MemoryAdapter;

use crate::utils::{async_trait, error::Result, json::Value};
use std::fmt::Debug;

/// Contenu initial d'une collection : documents ordonnés et schéma.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionData {
    pub documents: Vec<Value>,
    pub schema: Value,
}

// --- CONTRAT DE PERSISTANCE ---

/// Source durable d'une collection « fichier plat ». Le store lui demande
/// l'état initial une seule fois, puis lui confie la séquence complète après
/// chaque mutation.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync + Debug {
    async fn read_collection(&self, name: &str) -> Result<CollectionData>;

    async fn update_collection(&self, name: &str, documents: &[Value]) -> Result<()>;
}
