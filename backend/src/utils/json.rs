// FICHIER : backend/src/utils/json.rs

use crate::raise_error;
use crate::utils::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

// --- RE-EXPORTS (Single Source of Truth pour le JSON) ---
pub use serde_json::{json, Map, Value};

/// Parse une chaîne JSON en un type T.
/// Capture l'erreur de parsing avec un extrait du contenu en cas d'échec.
pub fn parse<T: DeserializeOwned>(s: &str) -> Result<T> {
    match serde_json::from_str(s) {
        Ok(val) => Ok(val),
        Err(e) => {
            let snippet: String = s.chars().take(100).collect();
            raise_error!(
                AppError::Serialization(e),
                context = json!({ "snippet": snippet })
            );
        }
    }
}

/// Convertit un type T en chaîne JSON compacte.
pub fn stringify<T: Serialize>(v: &T) -> Result<String> {
    match serde_json::to_string(v) {
        Ok(s) => Ok(s),
        Err(e) => raise_error!(AppError::Serialization(e)),
    }
}

/// Convertit un type T en chaîne JSON formatée (pretty).
pub fn stringify_pretty<T: Serialize>(v: &T) -> Result<String> {
    match serde_json::to_string_pretty(v) {
        Ok(s) => Ok(s),
        Err(e) => raise_error!(AppError::Serialization(e)),
    }
}

/// Convertit un `serde_json::Value` en type T.
pub fn from_value<T: DeserializeOwned>(v: Value) -> Result<T> {
    match serde_json::from_value(v) {
        Ok(val) => Ok(val),
        Err(e) => raise_error!(AppError::Serialization(e)),
    }
}

/// Fusion de premier niveau : chaque clé de `patch` remplace celle de `target`.
pub fn shallow_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (k, v) in patch {
        target.insert(k.clone(), v.clone());
    }
}

/// Lit un champ en notation pointée (`dimensions.length`).
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Écrit un champ en notation pointée, en créant les objets intermédiaires.
/// Renvoie `false` si un segment intermédiaire n'est pas un objet.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut parts = path.split('.').peekable();
    let mut current = doc;
    while let Some(part) = parts.next() {
        let Some(map) = current.as_object_mut() else {
            return false;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return true;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    false
}

/// Supprime un champ en notation pointée. Renvoie la valeur retirée.
pub fn unset_path(doc: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => {
            let mut current = doc;
            for part in parent.split('.') {
                current = current.as_object_mut()?.get_mut(part)?;
            }
            current.as_object_mut()?.remove(leaf)
        }
        None => doc.as_object_mut()?.remove(path),
    }
}
