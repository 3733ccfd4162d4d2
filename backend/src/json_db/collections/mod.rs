//! Collections de documents : contrat commun et ses deux stratégies de stockage

use crate::json_db::query::FindOptions;
use crate::utils::{async_trait, prelude::*};
use std::fmt::Debug;

pub mod engine_store;
pub mod flat_store;
pub mod id_index;

pub use engine_store::EngineStore;
pub use flat_store::FlatFileStore;
pub use id_index::IdIndex;

/// Cible d'une mutation : une identité, ou une condition de requête.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Id(Value),
    Query(Value),
}

impl Selector {
    /// `{identity: v}` -> `Id(v)` ; un scalaire -> `Id` ; sinon `Query`.
    pub fn from_value(raw: Value, identity_field: &str) -> Self {
        match raw {
            Value::Object(map) if map.len() == 1 && map.contains_key(identity_field) => {
                match map.into_iter().next() {
                    Some((_, id)) => Selector::Id(id),
                    None => Selector::Query(Value::Null),
                }
            }
            Value::Object(map) => Selector::Query(Value::Object(map)),
            scalar => Selector::Id(scalar),
        }
    }
}

/// Résultat d'une écriture : le document concerné (fichier plat) ou un
/// nombre de documents touchés (moteur embarqué, suppression par requête).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WriteOutcome {
    Document(Value),
    Count(u64),
}

impl WriteOutcome {
    pub fn count(&self) -> u64 {
        match self {
            WriteOutcome::Document(_) => 1,
            WriteOutcome::Count(n) => *n,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            WriteOutcome::Document(doc) => doc,
            WriteOutcome::Count(n) => json!(n),
        }
    }
}

/// Capacité commune aux collections, quelle que soit la stratégie de stockage.
///
/// Chaque collection est chargée paresseusement au premier appel (une seule
/// lecture même sous accès concurrents). Toute mutation est validée contre le
/// schéma avant de toucher l'état en mémoire.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// `id` (fichier plat) ou `_id` (moteur embarqué).
    fn identity_field(&self) -> &str;

    /// Force le chargement (utilisé par `autoload`).
    async fn ensure_loaded(&self) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<Value>>;

    async fn find(&self, condition: Option<&Value>, options: &FindOptions) -> Result<Vec<Value>>;

    async fn find_one(&self, query: &Value) -> Result<Option<Value>>;

    async fn find_by_id(&self, id: &Value) -> Result<Value>;

    async fn insert(&self, data: Value) -> Result<Value>;

    async fn update(&self, selector: Selector, data: Value) -> Result<WriteOutcome>;

    async fn update_partially(&self, selector: Selector, patch: Value) -> Result<WriteOutcome>;

    async fn delete(&self, selector: Selector) -> Result<WriteOutcome>;

    async fn get_schema(&self) -> Result<Value>;

    /// Vide la collection ; `true` si elle est vide après coup.
    async fn drop_collection(&self) -> Result<bool>;
}
