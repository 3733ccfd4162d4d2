// FICHIER : backend/src/json_db/storage/memory.rs

use super::{CollectionData, PersistenceAdapter};
use crate::raise_error;
use crate::utils::async_trait;
use crate::utils::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Stockage volatil : collections de démonstration, tests.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    collections: Mutex<HashMap<String, CollectionData>>,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, name: &str, documents: Vec<Value>, schema: Value) -> Self {
        if let Ok(mut map) = self.collections.lock() {
            map.insert(name.to_lowercase(), CollectionData { documents, schema });
        }
        self
    }

    /// Simule une panne disque sur les écritures suivantes.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Nombre d'appels à `read_collection` reçus.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Dernier état persisté d'une collection.
    pub fn documents(&self, name: &str) -> Option<Vec<Value>> {
        self.lock()
            .ok()?
            .get(&name.to_lowercase())
            .map(|c| c.documents.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CollectionData>>> {
        self.collections
            .lock()
            .map_err(|e| AppError::from(format!("Verrou mémoire empoisonné : {}", e)))
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn read_collection(&self, name: &str) -> Result<CollectionData> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let found = self.lock()?.get(&name.to_lowercase()).cloned();
        match found {
            Some(data) => Ok(data),
            None => raise_error!(AppError::Config(format!(
                "Collection {} absente du stockage mémoire",
                name
            ))),
        }
    }

    async fn update_collection(&self, name: &str, documents: &[Value]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            raise_error!(AppError::Persistence(format!(
                "Écriture refusée pour la collection {}",
                name
            )));
        }
        let mut map = self.lock()?;
        match map.get_mut(&name.to_lowercase()) {
            Some(data) => data.documents = documents.to_vec(),
            None => {
                map.insert(
                    name.to_lowercase(),
                    CollectionData {
                        documents: documents.to_vec(),
                        schema: json!({}),
                    },
                );
            }
        }
        Ok(())
    }
}
