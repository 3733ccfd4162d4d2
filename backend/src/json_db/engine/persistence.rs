// FICHIER : backend/src/json_db/engine/persistence.rs

use super::{DELETED_FLAG, ID_FIELD};
use crate::json_db::collections::id_index::key_of;
use crate::raise_error;
use crate::utils::fs::{self, Path, PathBuf};
use crate::utils::json as json_utils;
use crate::utils::prelude::*;
use std::collections::HashMap;

/// Journal d'une base embarquée.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

/// Ligne de suppression : `{"$$deleted": true, "_id": …}`.
pub fn tombstone(id: &Value) -> Value {
    let mut map = Map::new();
    map.insert(DELETED_FLAG.to_string(), Value::Bool(true));
    map.insert(ID_FIELD.to_string(), id.clone());
    Value::Object(map)
}

fn is_tombstone(doc: &Map<String, Value>) -> bool {
    doc.get(DELETED_FLAG) == Some(&Value::Bool(true))
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fichier temporaire de réécriture : `<fichier>~`.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push("~");
        PathBuf::from(name)
    }

    /// Crée le journal s'il manque. Une réécriture interrompue après le
    /// `fsync` du temporaire est reprise depuis `<fichier>~`.
    pub async fn ensure_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::ensure_dir(parent).await?;
        }
        if fs::exists(&self.path).await {
            return Ok(());
        }
        let temp = self.temp_path();
        if fs::exists(&temp).await {
            warn!(path = ?self.path, "Reprise du journal depuis le fichier temporaire");
            let content = fs::read_to_string(&temp).await?;
            return fs::write_atomic_via(&self.path, &temp, content.as_bytes()).await;
        }
        fs::append_lines(&self.path, &[]).await
    }

    /// Rejoue le journal : la dernière ligne d'un `_id` l'emporte, les
    /// suppressions retirent le document. L'ordre d'insertion est conservé.
    pub async fn replay(&self, corrupt_alert_threshold: f64) -> Result<Vec<Value>> {
        let content = fs::read_to_string(&self.path).await?;

        let mut slots: Vec<Option<Value>> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;
        let mut corrupt = 0usize;

        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            total += 1;
            let parsed: std::result::Result<Value, _> = serde_json::from_str(line);
            let Ok(Value::Object(doc)) = parsed else {
                corrupt += 1;
                continue;
            };
            let Some(key) = doc.get(ID_FIELD).and_then(key_of) else {
                corrupt += 1;
                continue;
            };

            if is_tombstone(&doc) {
                if let Some(pos) = positions.remove(&key) {
                    slots[pos] = None;
                }
            } else if let Some(&pos) = positions.get(&key) {
                slots[pos] = Some(Value::Object(doc));
            } else {
                positions.insert(key, slots.len());
                slots.push(Some(Value::Object(doc)));
            }
        }

        if corrupt > 0 {
            let ratio = corrupt as f64 / total as f64;
            if ratio > corrupt_alert_threshold {
                raise_error!(
                    AppError::Persistence(format!(
                        "Journal corrompu {} : {}/{} lignes illisibles (seuil {})",
                        self.path.display(),
                        corrupt,
                        total,
                        corrupt_alert_threshold
                    )),
                    context = json!({ "path": self.path.to_string_lossy(), "ratio": ratio })
                );
            }
            warn!(path = ?self.path, corrupt, total, "Lignes illisibles ignorées");
        }

        Ok(slots.into_iter().flatten().collect())
    }

    pub async fn append(&self, entries: &[Value]) -> Result<()> {
        let lines = entries
            .iter()
            .map(json_utils::stringify)
            .collect::<Result<Vec<String>>>()?;
        fs::append_lines(&self.path, &lines).await
    }

    /// Réécrit le journal avec l'état courant (`<fichier>~`, fsync, rename).
    pub async fn rewrite(&self, documents: &[Value]) -> Result<()> {
        let mut content = String::new();
        for doc in documents {
            content.push_str(&json_utils::stringify(doc)?);
            content.push('\n');
        }
        fs::write_atomic_via(&self.path, &self.temp_path(), content.as_bytes()).await
    }
}
