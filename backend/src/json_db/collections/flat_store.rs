// FICHIER : backend/src/json_db/collections/flat_store.rs

use super::id_index::{key_of, IdIndex};
use super::{DocumentStore, Selector, WriteOutcome};
use crate::json_db::query::{loose_eq, FindOptions, Matcher};
use crate::json_db::schema::{SchemaValidator, ValidationReport};
use crate::json_db::storage::PersistenceAdapter;
use crate::raise_error;
use crate::utils::prelude::*;
use crate::utils::{async_trait, json as json_utils, Arc, AsyncMutex, AsyncRwLock, OnceCell};
use uuid::Uuid;

const IDENTITY: &str = "id";

/// État figé d'une collection. Remplacé en bloc après chaque écriture réussie.
#[derive(Debug)]
struct Snapshot {
    documents: Vec<Value>,
    index: IdIndex,
}

#[derive(Debug)]
struct Loaded {
    validator: SchemaValidator,
    snapshot: AsyncRwLock<Arc<Snapshot>>,
}

/// Collection « fichier plat » : séquence complète en mémoire, réécrite
/// entièrement par l'adaptateur à chaque mutation.
#[derive(Debug)]
pub struct FlatFileStore {
    name: String,
    adapter: Arc<dyn PersistenceAdapter>,
    state: OnceCell<Loaded>,
    write_lock: AsyncMutex<()>,
}

impl FlatFileStore {
    pub fn new(name: impl Into<String>, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            name: name.into(),
            adapter,
            state: OnceCell::new(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    // Les appelants concurrents attendent le même chargement ; un échec
    // laisse la cellule vide et le prochain appel retente.
    async fn loaded(&self) -> Result<&Loaded> {
        self.state
            .get_or_try_init(|| async {
                info!(collection = %self.name, "Chargement de la collection");
                let data = self.adapter.read_collection(&self.name).await?;
                let index = IdIndex::build(&data.documents, IDENTITY)?;
                Ok::<_, AppError>(Loaded {
                    validator: SchemaValidator::new(data.schema),
                    snapshot: AsyncRwLock::new(Arc::new(Snapshot {
                        documents: data.documents,
                        index,
                    })),
                })
            })
            .await
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let loaded = self.loaded().await?;
        let snapshot = loaded.snapshot.read().await.clone();
        Ok(snapshot)
    }

    fn check(&self, validator: &SchemaValidator, doc: &Value) -> Result<()> {
        let report = validator.validate(doc);
        if !report.valid {
            raise_error!(
                AppError::Validation(report),
                context = json!({ "collection": self.name })
            );
        }
        Ok(())
    }

    fn require_object(&self, data: Value) -> Result<Map<String, Value>> {
        match data {
            Value::Object(map) => Ok(map),
            _ => raise_error!(
                AppError::Validation(ValidationReport::single(
                    "",
                    "Le document doit être un objet JSON"
                )),
                context = json!({ "collection": self.name })
            ),
        }
    }

    fn check_identity(&self, replacement: &Map<String, Value>, existing: Option<&Value>) -> Result<()> {
        if let (Some(new_id), Some(old_id)) = (replacement.get(IDENTITY), existing) {
            if !loose_eq(new_id, old_id) {
                raise_error!(
                    AppError::Validation(ValidationReport::single(
                        format!("/{}", IDENTITY),
                        format!("L'identifiant est immuable ({} -> {})", old_id, new_id)
                    )),
                    context = json!({ "collection": self.name })
                );
            }
        }
        Ok(())
    }

    fn resolve(&self, snapshot: &Snapshot, selector: &Selector) -> Vec<usize> {
        match selector {
            Selector::Id(id) => snapshot.index.position(id).into_iter().collect(),
            Selector::Query(query) => {
                let matcher = Matcher::new(query);
                if let Some(id) = matcher.identity_lookup(IDENTITY) {
                    return snapshot.index.position(id).into_iter().collect();
                }
                snapshot
                    .documents
                    .iter()
                    .enumerate()
                    .filter(|(_, doc)| matcher.matches(doc))
                    .map(|(pos, _)| pos)
                    .collect()
            }
        }
    }

    fn not_found(&self, selector: &Selector) -> AppError {
        let target = match selector {
            Selector::Id(id) => format!("id {}", id),
            Selector::Query(q) => format!("requête {}", q),
        };
        AppError::NotFound(format!(
            "Aucun document ({}) dans la collection {}",
            target, self.name
        ))
    }

    /// Persiste la nouvelle séquence puis publie le snapshot. Si l'écriture
    /// échoue, l'état en mémoire reste celui d'avant.
    async fn commit(&self, loaded: &Loaded, documents: Vec<Value>) -> Result<()> {
        let index = IdIndex::build(&documents, IDENTITY)?;
        self.adapter.update_collection(&self.name, &documents).await?;
        *loaded.snapshot.write().await = Arc::new(Snapshot { documents, index });
        Ok(())
    }

    fn outcome(updated: Vec<Value>) -> WriteOutcome {
        if updated.len() == 1 {
            updated.into_iter().next().map_or(WriteOutcome::Count(0), WriteOutcome::Document)
        } else {
            WriteOutcome::Count(updated.len() as u64)
        }
    }
}

#[async_trait]
impl DocumentStore for FlatFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_field(&self) -> &str {
        IDENTITY
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.loaded().await.map(|_| ())
    }

    async fn find_all(&self) -> Result<Vec<Value>> {
        Ok(self.snapshot().await?.documents.clone())
    }

    async fn find(&self, condition: Option<&Value>, options: &FindOptions) -> Result<Vec<Value>> {
        let snapshot = self.snapshot().await?;
        let filtered: Vec<Value> = match condition {
            Some(cond) => {
                let matcher = Matcher::new(cond);
                snapshot
                    .documents
                    .iter()
                    .filter(|doc| matcher.matches(doc))
                    .cloned()
                    .collect()
            }
            None => snapshot.documents.clone(),
        };
        Ok(options.apply(filtered))
    }

    async fn find_one(&self, query: &Value) -> Result<Option<Value>> {
        let snapshot = self.snapshot().await?;
        let matcher = Matcher::new(query);
        if let Some(id) = matcher.identity_lookup(IDENTITY) {
            return Ok(snapshot
                .index
                .position(id)
                .map(|pos| snapshot.documents[pos].clone()));
        }
        Ok(snapshot.documents.iter().find(|doc| matcher.matches(doc)).cloned())
    }

    async fn find_by_id(&self, id: &Value) -> Result<Value> {
        let snapshot = self.snapshot().await?;
        match snapshot.index.position(id) {
            Some(pos) => Ok(snapshot.documents[pos].clone()),
            None => raise_error!(self.not_found(&Selector::Id(id.clone()))),
        }
    }

    async fn insert(&self, data: Value) -> Result<Value> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.loaded().await?;

        self.check(&loaded.validator, &data)?;
        let mut map = self.require_object(data)?;
        let current = loaded.snapshot.read().await.clone();

        match map.get(IDENTITY) {
            None | Some(Value::Null) => {
                map.insert(IDENTITY.to_string(), json!(Uuid::new_v4().to_string()));
            }
            Some(id) if key_of(id).is_none() => raise_error!(AppError::Validation(
                ValidationReport::single(
                    format!("/{}", IDENTITY),
                    "L'identifiant doit être une chaîne ou un nombre"
                )
            )),
            Some(id) if current.index.contains(id) => raise_error!(
                AppError::Validation(ValidationReport::single(
                    format!("/{}", IDENTITY),
                    format!("Identifiant déjà utilisé : {}", id)
                )),
                context = json!({ "collection": self.name })
            ),
            Some(_) => {}
        }

        let doc = Value::Object(map);
        let mut documents = current.documents.clone();
        documents.push(doc.clone());
        self.commit(loaded, documents).await?;

        debug!(collection = %self.name, id = %doc[IDENTITY], "Document inséré");
        Ok(doc)
    }

    async fn update(&self, selector: Selector, data: Value) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.loaded().await?;

        self.check(&loaded.validator, &data)?;
        let replacement = self.require_object(data)?;
        let current = loaded.snapshot.read().await.clone();

        let positions = self.resolve(&current, &selector);
        if positions.is_empty() {
            raise_error!(self.not_found(&selector));
        }

        let mut documents = current.documents.clone();
        let mut updated = Vec::with_capacity(positions.len());
        for pos in positions {
            let existing_id = documents[pos].get(IDENTITY).cloned();
            self.check_identity(&replacement, existing_id.as_ref())?;

            let mut doc = replacement.clone();
            if let (false, Some(id)) = (doc.contains_key(IDENTITY), existing_id) {
                doc.insert(IDENTITY.to_string(), id);
            }
            documents[pos] = Value::Object(doc);
            updated.push(documents[pos].clone());
        }

        self.commit(loaded, documents).await?;
        Ok(Self::outcome(updated))
    }

    async fn update_partially(&self, selector: Selector, patch: Value) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.loaded().await?;

        let patch = self.require_object(patch)?;
        let current = loaded.snapshot.read().await.clone();

        let positions = self.resolve(&current, &selector);
        if positions.is_empty() {
            raise_error!(self.not_found(&selector));
        }

        let mut documents = current.documents.clone();
        let mut updated = Vec::with_capacity(positions.len());
        for pos in positions {
            // Copie isolée : l'original reste intact si la validation échoue.
            let mut merged = match &documents[pos] {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            self.check_identity(&patch, merged.get(IDENTITY))?;
            json_utils::shallow_merge(&mut merged, &patch);

            let merged = Value::Object(merged);
            self.check(&loaded.validator, &merged)?;
            documents[pos] = merged.clone();
            updated.push(merged);
        }

        self.commit(loaded, documents).await?;
        Ok(Self::outcome(updated))
    }

    async fn delete(&self, selector: Selector) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.loaded().await?;
        let current = loaded.snapshot.read().await.clone();

        let mut positions = self.resolve(&current, &selector);
        if positions.is_empty() {
            return Ok(WriteOutcome::Count(0));
        }

        let mut documents = current.documents.clone();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        let removed: Vec<Value> = positions.iter().map(|&pos| documents.remove(pos)).collect();

        self.commit(loaded, documents).await?;
        info!(collection = %self.name, count = removed.len(), "Documents supprimés");

        Ok(match (selector, removed.len()) {
            (Selector::Id(_), 1) => removed
                .into_iter()
                .next()
                .map_or(WriteOutcome::Count(0), WriteOutcome::Document),
            (_, n) => WriteOutcome::Count(n as u64),
        })
    }

    async fn get_schema(&self) -> Result<Value> {
        Ok(self.loaded().await?.validator.schema().clone())
    }

    async fn drop_collection(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.loaded().await?;
        self.commit(loaded, Vec::new()).await?;
        warn!(collection = %self.name, "Collection vidée");
        Ok(loaded.snapshot.read().await.documents.is_empty())
    }
}
