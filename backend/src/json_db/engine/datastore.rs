// FICHIER : backend/src/json_db/engine/datastore.rs

use super::persistence::{tombstone, LogFile};
use super::{DatastoreOptions, ID_FIELD};
use crate::json_db::collections::id_index::{key_of, IdIndex};
use crate::json_db::query::{loose_eq, Matcher};
use crate::json_db::schema::{ValidationIssue, ValidationReport};
use crate::raise_error;
use crate::utils::json as json_utils;
use crate::utils::prelude::*;
use crate::utils::{AsyncMutex, AsyncRwLock, OnceCell};
use chrono::Utc;
use uuid::Uuid;

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

#[derive(Debug, Default)]
struct EngineState {
    documents: Vec<Value>,
    index: IdIndex,
}

impl EngineState {
    fn new(documents: Vec<Value>) -> Result<Self> {
        let index = IdIndex::build(&documents, ID_FIELD)?;
        Ok(Self { documents, index })
    }

    fn positions(&self, matcher: &Matcher) -> Vec<usize> {
        if let Some(id) = matcher.identity_lookup(ID_FIELD) {
            return self.index.position(id).into_iter().collect();
        }
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| matcher.matches(doc))
            .map(|(pos, _)| pos)
            .collect()
    }
}

/// Base de documents embarquée. Les écritures ajoutent une ligne au journal
/// avant de toucher la mémoire ; le journal est compacté après chaque
/// chargement et sur demande.
#[derive(Debug)]
pub struct Datastore {
    options: DatastoreOptions,
    log: Option<LogFile>,
    state: OnceCell<AsyncRwLock<EngineState>>,
    write_lock: AsyncMutex<()>,
}

impl Datastore {
    pub fn new(options: DatastoreOptions) -> Self {
        let log = options.log_path().map(LogFile::new);
        Self {
            options,
            log,
            state: OnceCell::new(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn options(&self) -> &DatastoreOptions {
        &self.options
    }

    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    fn label(&self) -> String {
        match &self.log {
            Some(log) => log.path().display().to_string(),
            None => "<mémoire>".to_string(),
        }
    }

    /// Charge la base (idempotent). Les appels concurrents partagent le même
    /// chargement en cours.
    #[instrument(skip(self), fields(db = %self.label()))]
    pub async fn load_database(&self) -> Result<()> {
        self.state
            .get_or_try_init(|| async {
                let documents = match &self.log {
                    Some(log) => {
                        log.ensure_exists().await?;
                        let documents = log.replay(self.options.corrupt_alert_threshold).await?;
                        log.rewrite(&documents).await?;
                        documents
                    }
                    None => Vec::new(),
                };
                info!(count = documents.len(), "Base embarquée chargée");
                Ok::<_, AppError>(AsyncRwLock::new(EngineState::new(documents)?))
            })
            .await
            .map(|_| ())
    }

    async fn ready(&self) -> Result<&AsyncRwLock<EngineState>> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }
        if self.options.autoload {
            self.load_database().await?;
            if let Some(state) = self.state.get() {
                return Ok(state);
            }
        }
        raise_error!(AppError::Config(format!(
            "Base {} non chargée (not loaded) : appeler load_database()",
            self.label()
        )))
    }

    // --- LECTURE ---

    pub async fn find(&self, query: &Value) -> Result<Vec<Value>> {
        let state = self.ready().await?.read().await;
        let matcher = Matcher::new(query);
        Ok(state
            .positions(&matcher)
            .into_iter()
            .map(|pos| state.documents[pos].clone())
            .collect())
    }

    pub async fn find_one(&self, query: &Value) -> Result<Option<Value>> {
        let state = self.ready().await?.read().await;
        let matcher = Matcher::new(query);
        Ok(state
            .positions(&matcher)
            .first()
            .map(|&pos| state.documents[pos].clone()))
    }

    pub async fn count(&self, query: &Value) -> Result<u64> {
        let state = self.ready().await?.read().await;
        Ok(state.positions(&Matcher::new(query)).len() as u64)
    }

    // --- ÉCRITURE ---

    pub async fn insert(&self, doc: Value) -> Result<Value> {
        let _guard = self.write_lock.lock().await;
        let state_lock = self.ready().await?;

        let Value::Object(mut map) = doc else {
            raise_error!(AppError::Validation(ValidationReport::single(
                "",
                "Le document doit être un objet JSON"
            )));
        };
        check_field_names(&map)?;

        let taken = match map.get(ID_FIELD) {
            Some(id) => state_lock.read().await.index.contains(id),
            None => false,
        };
        match map.get(ID_FIELD) {
            None | Some(Value::Null) => {
                map.insert(ID_FIELD.to_string(), json!(new_id()));
            }
            Some(id) if key_of(id).is_none() => raise_error!(AppError::Validation(
                ValidationReport::single("/_id", "L'identifiant doit être une chaîne ou un nombre")
            )),
            Some(id) if taken => raise_error!(AppError::Validation(ValidationReport::single(
                "/_id",
                format!("Identifiant déjà utilisé : {}", id)
            ))),
            Some(_) => {}
        }

        if self.options.timestamp_data {
            let now = json!(Utc::now().to_rfc3339());
            map.entry(CREATED_AT.to_string()).or_insert_with(|| now.clone());
            map.insert(UPDATED_AT.to_string(), now);
        }

        let doc = Value::Object(map);
        if let Some(log) = &self.log {
            log.append(std::slice::from_ref(&doc)).await?;
        }

        let mut state = state_lock.write().await;
        let position = state.documents.len();
        state.index.insert(&doc[ID_FIELD], position);
        state.documents.push(doc.clone());
        Ok(doc)
    }

    /// Remplace (objet simple) ou modifie (`$set` / `$unset`) les documents
    /// correspondant à `query`. Renvoie le nombre de documents touchés.
    pub async fn update(&self, query: &Value, update: &Value, multi: bool) -> Result<u64> {
        self.update_with(query, update, multi, |_| Ok(())).await
    }

    /// Comme `update`, mais `check` reçoit chaque document résultant (avant
    /// horodatage) ; une seule erreur annule toute l'opération.
    pub async fn update_with<F>(
        &self,
        query: &Value,
        update: &Value,
        multi: bool,
        check: F,
    ) -> Result<u64>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync,
    {
        let _guard = self.write_lock.lock().await;
        let state_lock = self.ready().await?;

        let modifier = Modifier::parse(update)?;
        let matcher = Matcher::new(query);

        let (positions, new_docs) = {
            let state = state_lock.read().await;
            let mut positions = state.positions(&matcher);
            if !multi {
                positions.truncate(1);
            }
            let mut new_docs = Vec::with_capacity(positions.len());
            for &pos in &positions {
                let mut next = self.apply(&state.documents[pos], &modifier)?;
                check(&next)?;
                self.stamp_update(&mut next);
                new_docs.push(next);
            }
            (positions, new_docs)
        };

        if positions.is_empty() {
            return Ok(0);
        }
        if let Some(log) = &self.log {
            log.append(&new_docs).await?;
        }

        let mut state = state_lock.write().await;
        for (pos, doc) in positions.iter().zip(new_docs) {
            state.documents[*pos] = doc;
        }
        Ok(positions.len() as u64)
    }

    fn apply(&self, current: &Value, modifier: &Modifier) -> Result<Value> {
        let id = current.get(ID_FIELD).cloned().unwrap_or(Value::Null);
        let next = match modifier {
            Modifier::Replace(replacement) => {
                if let Some(new_id) = replacement.get(ID_FIELD) {
                    if !loose_eq(new_id, &id) {
                        raise_error!(AppError::Validation(ValidationReport::single(
                            "/_id",
                            format!("L'identifiant est immuable ({} -> {})", id, new_id)
                        )));
                    }
                }
                let mut map = replacement.clone();
                map.insert(ID_FIELD.to_string(), id.clone());
                if let Some(created) = current.get(CREATED_AT).filter(|_| self.options.timestamp_data) {
                    map.entry(CREATED_AT.to_string()).or_insert_with(|| created.clone());
                }
                Value::Object(map)
            }
            Modifier::Operators { set, unset } => {
                let mut doc = current.clone();
                for (path, value) in set {
                    if path == ID_FIELD && !loose_eq(value, &id) {
                        raise_error!(AppError::Validation(ValidationReport::single(
                            "/_id",
                            "L'identifiant est immuable"
                        )));
                    }
                    if !json_utils::set_path(&mut doc, path, value.clone()) {
                        raise_error!(AppError::Validation(ValidationReport::single(
                            format!("/{}", path.replace('.', "/")),
                            format!("Impossible d'affecter '{}' : parent non objet", path)
                        )));
                    }
                }
                for path in unset {
                    if path != ID_FIELD {
                        json_utils::unset_path(&mut doc, path);
                    }
                }
                doc
            }
        };

        if let Value::Object(map) = &next {
            check_field_names(map)?;
        }
        Ok(next)
    }

    fn stamp_update(&self, doc: &mut Value) {
        if let (true, Value::Object(map)) = (self.options.timestamp_data, doc) {
            map.insert(UPDATED_AT.to_string(), json!(Utc::now().to_rfc3339()));
        }
    }

    pub async fn remove(&self, query: &Value, multi: bool) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let state_lock = self.ready().await?;
        let matcher = Matcher::new(query);

        let mut positions = state_lock.read().await.positions(&matcher);
        if !multi {
            positions.truncate(1);
        }
        if positions.is_empty() {
            return Ok(0);
        }

        let mut state = state_lock.write().await;
        if let Some(log) = &self.log {
            let tombstones: Vec<Value> = positions
                .iter()
                .map(|&pos| tombstone(&state.documents[pos][ID_FIELD]))
                .collect();
            log.append(&tombstones).await?;
        }

        positions.sort_unstable_by(|a, b| b.cmp(a));
        let mut documents = std::mem::take(&mut state.documents);
        for &pos in &positions {
            documents.remove(pos);
        }
        *state = EngineState::new(documents)?;
        Ok(positions.len() as u64)
    }

    /// Réécrit le journal avec l'état courant (suppression des lignes obsolètes).
    pub async fn compact(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let state_lock = self.ready().await?;
        if let Some(log) = &self.log {
            let state = state_lock.read().await;
            log.rewrite(&state.documents).await?;
            debug!(db = %self.label(), count = state.documents.len(), "Journal compacté");
        }
        Ok(())
    }
}

enum Modifier {
    Replace(Map<String, Value>),
    Operators {
        set: Map<String, Value>,
        unset: Vec<String>,
    },
}

impl Modifier {
    fn parse(update: &Value) -> Result<Self> {
        let Some(map) = update.as_object() else {
            raise_error!(AppError::Validation(ValidationReport::single(
                "",
                "La mise à jour doit être un objet JSON"
            )));
        };
        if !map.keys().any(|k| k.starts_with('$')) {
            return Ok(Modifier::Replace(map.clone()));
        }

        let mut set = Map::new();
        let mut unset = Vec::new();
        for (op, arg) in map {
            match (op.as_str(), arg) {
                ("$set", Value::Object(fields)) => set.extend(fields.clone()),
                ("$unset", Value::Object(fields)) => unset.extend(fields.keys().cloned()),
                _ => raise_error!(AppError::Validation(ValidationReport::single(
                    format!("/{}", op),
                    format!("Modificateur non supporté : {}", op)
                ))),
            }
        }
        Ok(Modifier::Operators { set, unset })
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Les noms de champ ne peuvent ni commencer par `$` ni contenir de `.`.
fn check_field_names(map: &Map<String, Value>) -> Result<()> {
    let mut issues = Vec::new();
    collect_bad_names(map, "", &mut issues);
    if !issues.is_empty() {
        raise_error!(AppError::Validation(ValidationReport::from_issues(issues)));
    }
    Ok(())
}

fn collect_bad_names(map: &Map<String, Value>, path: &str, issues: &mut Vec<ValidationIssue>) {
    for (key, value) in map {
        let here = format!("{}/{}", path, key);
        if key.starts_with('$') || key.contains('.') {
            issues.push(ValidationIssue::new(
                &here,
                format!("Nom de champ interdit : '{}'", key),
            ));
        }
        match value {
            Value::Object(child) => collect_bad_names(child, &here, issues),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Object(child) = item {
                        collect_bad_names(child, &format!("{}/{}", here, i), issues);
                    }
                }
            }
            _ => {}
        }
    }
}
