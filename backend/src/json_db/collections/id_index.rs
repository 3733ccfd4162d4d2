// FICHIER : backend/src/json_db/collections/id_index.rs

use crate::json_db::query::matcher::numeric_of;
use crate::raise_error;
use crate::utils::prelude::*;
use std::collections::HashMap;

/// Index identité -> position dans la séquence ordonnée des documents.
///
/// Les clés sont canonisées pour suivre l'égalité lâche du Matcher :
/// `2`, `2.0`, `"2"` et `" 2 "` désignent le même document.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    positions: HashMap<String, usize>,
}

impl IdIndex {
    /// Construit l'index ; échoue si deux documents partagent la même identité.
    pub fn build(documents: &[Value], identity_field: &str) -> Result<Self> {
        let mut positions = HashMap::with_capacity(documents.len());
        for (pos, doc) in documents.iter().enumerate() {
            let Some(key) = doc.get(identity_field).and_then(key_of) else {
                continue;
            };
            if let Some(previous) = positions.insert(key, pos) {
                raise_error!(
                    AppError::Persistence(format!(
                        "Identifiant dupliqué '{}' (positions {} et {})",
                        doc[identity_field], previous, pos
                    )),
                    context = json!({ "identityField": identity_field })
                );
            }
        }
        Ok(Self { positions })
    }

    pub fn position(&self, id: &Value) -> Option<usize> {
        key_of(id).and_then(|k| self.positions.get(&k).copied())
    }

    pub fn contains(&self, id: &Value) -> bool {
        self.position(id).is_some()
    }

    /// Enregistre un document ajouté en fin de séquence.
    pub fn insert(&mut self, id: &Value, position: usize) {
        if let Some(key) = key_of(id) {
            self.positions.insert(key, position);
        }
    }
}

/// Clé canonique d'une identité ; `None` si la valeur ne peut pas en être une.
/// Les entiers sont comparés exactement, quelle que soit leur taille.
pub fn key_of(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(match numeric_of(id) {
            Some(n) => n.to_string(),
            None => s.clone(),
        }),
        Value::Number(_) => numeric_of(id).map(|n| n.to_string()),
        _ => None,
    }
}
