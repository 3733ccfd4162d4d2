// FICHIER : backend/src/json_db/storage/file_storage.rs

use super::{CollectionData, PersistenceAdapter};
use crate::json_db::schema::SchemaSource;
use crate::raise_error;
use crate::utils::prelude::*;
use crate::utils::{
    async_trait,
    fs::{self, Path, PathBuf},
};

const INDEX_FILE: &str = "index.json";
const SCHEMA_FILE: &str = "schema.json";

/// Collection stockée sous `<basePath>/<nom en minuscules>/index.json`,
/// schéma dans `schema.json` (ou fourni par la configuration).
#[derive(Debug, Clone)]
pub struct FlatFileAdapter {
    base_path: PathBuf,
    schema: Option<SchemaSource>,
}

impl FlatFileAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            schema: None,
        }
    }

    /// Remplace `schema.json` par un schéma en ligne ou un chemin explicite.
    pub fn with_schema(mut self, schema: Option<SchemaSource>) -> Self {
        self.schema = schema;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.base_path.join(name.to_lowercase())
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.collection_dir(name).join(INDEX_FILE)
    }

    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.collection_dir(name).join(SCHEMA_FILE)
    }

    async fn read_schema(&self, name: &str) -> Result<Value> {
        if let Some(source) = &self.schema {
            return source.load(&self.base_path).await;
        }
        let path = self.schema_path(name);
        require_artifact(&path, name).await?;
        fs::read_json(&path).await
    }
}

// Les artefacts ne sont jamais créés implicitement.
async fn require_artifact(path: &Path, name: &str) -> Result<()> {
    if !fs::exists(path).await {
        raise_error!(
            AppError::Config(format!(
                "Fichier requis absent pour la collection {} : {}",
                name,
                path.display()
            )),
            context = json!({ "collection": name, "path": path.to_string_lossy() })
        );
    }
    Ok(())
}

#[async_trait]
impl PersistenceAdapter for FlatFileAdapter {
    #[instrument(skip(self), fields(base = ?self.base_path))]
    async fn read_collection(&self, name: &str) -> Result<CollectionData> {
        let index_path = self.index_path(name);
        require_artifact(&index_path, name).await?;

        let documents = match fs::read_json::<Value>(&index_path).await? {
            Value::Array(docs) => docs,
            other => raise_error!(
                AppError::Config(format!(
                    "{} doit contenir un tableau JSON (reçu : {})",
                    index_path.display(),
                    type_label(&other)
                )),
                context = json!({ "collection": name })
            ),
        };
        let schema = self.read_schema(name).await?;

        debug!(collection = name, count = documents.len(), "Collection lue");
        Ok(CollectionData { documents, schema })
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn update_collection(&self, name: &str, documents: &[Value]) -> Result<()> {
        fs::write_json_atomic(&self.index_path(name), &documents).await
    }
}

fn type_label(v: &Value) -> &'static str {
    match v {
        Value::Object(_) => "objet",
        Value::String(_) => "chaîne",
        Value::Number(_) => "nombre",
        Value::Bool(_) => "booléen",
        Value::Null => "null",
        Value::Array(_) => "tableau",
    }
}
