// FICHIER : backend/src/json_db/collections/engine_store.rs

use super::{DocumentStore, Selector, WriteOutcome};
use crate::json_db::engine::{Datastore, ID_FIELD};
use crate::json_db::query::FindOptions;
use crate::json_db::schema::{SchemaSource, SchemaValidator, ValidationReport};
use crate::raise_error;
use crate::utils::fs::PathBuf;
use crate::utils::prelude::*;
use crate::utils::{async_trait, Arc, AsyncMutex, OnceCell};

/// Collection adossée au moteur embarqué. Le schéma est résolu et la base
/// chargée au premier accès ; sans schéma déclaré, tout objet est accepté.
#[derive(Debug)]
pub struct EngineStore {
    name: String,
    datastore: Arc<Datastore>,
    schema_source: Option<SchemaSource>,
    base_path: PathBuf,
    validator: OnceCell<SchemaValidator>,
    write_lock: AsyncMutex<()>,
}

impl EngineStore {
    pub fn new(
        name: impl Into<String>,
        datastore: Arc<Datastore>,
        schema_source: Option<SchemaSource>,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            datastore,
            schema_source,
            base_path: base_path.into(),
            validator: OnceCell::new(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.datastore
    }

    async fn loaded(&self) -> Result<&SchemaValidator> {
        self.validator
            .get_or_try_init(|| async {
                let schema = match &self.schema_source {
                    Some(source) => source.load(&self.base_path).await?,
                    None => json!({}),
                };
                self.datastore.load_database().await?;
                info!(collection = %self.name, "Collection embarquée prête");
                Ok::<_, AppError>(SchemaValidator::new(schema))
            })
            .await
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

    fn query_of(selector: &Selector) -> (Value, bool) {
        match selector {
            Selector::Id(id) => (json!({ ID_FIELD: id }), false),
            Selector::Query(q) => (q.clone(), true),
        }
    }

    fn not_found(&self, selector: &Selector) -> AppError {
        let target = match selector {
            Selector::Id(id) => format!("_id {}", id),
            Selector::Query(q) => format!("requête {}", q),
        };
        AppError::NotFound(format!(
            "Aucun document ({}) dans la collection {}",
            target, self.name
        ))
    }
}

#[async_trait]
impl DocumentStore for EngineStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_field(&self) -> &str {
        ID_FIELD
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.loaded().await.map(|_| ())
    }

    async fn find_all(&self) -> Result<Vec<Value>> {
        self.loaded().await?;
        self.datastore.find(&Value::Null).await
    }

    async fn find(&self, condition: Option<&Value>, options: &FindOptions) -> Result<Vec<Value>> {
        self.loaded().await?;
        let docs = self.datastore.find(condition.unwrap_or(&Value::Null)).await?;
        Ok(options.apply(docs))
    }

    async fn find_one(&self, query: &Value) -> Result<Option<Value>> {
        self.loaded().await?;
        self.datastore.find_one(query).await
    }

    async fn find_by_id(&self, id: &Value) -> Result<Value> {
        self.loaded().await?;
        match self.datastore.find_one(&json!({ ID_FIELD: id })).await? {
            Some(doc) => Ok(doc),
            None => raise_error!(self.not_found(&Selector::Id(id.clone()))),
        }
    }

    async fn insert(&self, data: Value) -> Result<Value> {
        let _guard = self.write_lock.lock().await;
        let validator = self.loaded().await?;
        self.check(validator, &data)?;
        self.datastore.insert(data).await
    }

    async fn update(&self, selector: Selector, data: Value) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let validator = self.loaded().await?;

        // Remplacement intégral uniquement : `{"$set": ...}` relève de `update_partially`.
        let Value::Object(map) = &data else {
            raise_error!(AppError::Validation(ValidationReport::single(
                "",
                "Le document doit être un objet JSON"
            )));
        };
        if let Some(op) = map.keys().find(|k| k.starts_with('$')) {
            raise_error!(AppError::Validation(ValidationReport::single(
                format!("/{}", op),
                format!("Champ réservé dans un remplacement : {}", op)
            )));
        }

        let (query, multi) = Self::query_of(&selector);
        let count = self
            .datastore
            .update_with(&query, &data, multi, |doc| self.check(validator, doc))
            .await?;
        if count == 0 {
            raise_error!(self.not_found(&selector));
        }
        Ok(WriteOutcome::Count(count))
    }

    /// Les clés du correctif suivent la sémantique `$set` du moteur
    /// (`"dimensions.length"` atteint le champ imbriqué) ; c'est le document
    /// résultant qui est validé.
    async fn update_partially(&self, selector: Selector, patch: Value) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let validator = self.loaded().await?;

        if !patch.is_object() {
            raise_error!(AppError::Validation(ValidationReport::single(
                "",
                "Le correctif doit être un objet JSON"
            )));
        }

        let (query, multi) = Self::query_of(&selector);
        let count = self
            .datastore
            .update_with(&query, &json!({ "$set": patch }), multi, |doc| {
                self.check(validator, doc)
            })
            .await?;
        if count == 0 {
            raise_error!(self.not_found(&selector));
        }
        Ok(WriteOutcome::Count(count))
    }

    async fn delete(&self, selector: Selector) -> Result<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        self.loaded().await?;
        let (query, multi) = Self::query_of(&selector);
        let removed = self.datastore.remove(&query, multi).await?;
        Ok(WriteOutcome::Count(removed))
    }

    async fn get_schema(&self) -> Result<Value> {
        Ok(self.loaded().await?.schema().clone())
    }

    async fn drop_collection(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.loaded().await?;
        let removed = self.datastore.remove(&Value::Null, true).await?;
        self.datastore.compact().await?;
        warn!(collection = %self.name, removed, "Collection vidée");
        Ok(self.datastore.count(&Value::Null).await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_db::engine::DatastoreOptions;
    use crate::json_db::test_utils::{init_test_logging, product_schema};
    use tempfile::tempdir;

    fn store(options: DatastoreOptions, base: &std::path::Path) -> EngineStore {
        init_test_logging();
        EngineStore::new(
            "product",
            Arc::new(Datastore::new(options)),
            Some(SchemaSource::Inline(product_schema())),
            base,
        )
    }

    #[tokio::test]
    async fn test_lazy_load_and_crud() {
        let dir = tempdir().unwrap();
        let store = store(DatastoreOptions::persistent(dir.path().join("product.db")), dir.path());
        assert!(!store.datastore().is_loaded());

        let stored = store
            .insert(json!({ "name": "TNT", "price": 42.99, "tags": ["explosive"] }))
            .await
            .unwrap();
        assert!(store.datastore().is_loaded());
        let id = stored["_id"].clone();

        let found = store.find_by_id(&id).await.unwrap();
        assert_eq!(found["name"], "TNT");

        let outcome = store
            .update(Selector::Id(id.clone()), json!({ "name": "TNT", "price": 50 }))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Count(1));
        assert_eq!(store.find_by_id(&id).await.unwrap()["price"], 50);
        assert!(store.find_by_id(&id).await.unwrap().get("tags").is_none());

        let patched = store
            .update_partially(Selector::Id(id.clone()), json!({ "price": 51 }))
            .await
            .unwrap();
        assert_eq!(patched.count(), 1);
        assert_eq!(store.find_by_id(&id).await.unwrap()["name"], "TNT");

        assert_eq!(store.delete(Selector::Id(id.clone())).await.unwrap(), WriteOutcome::Count(1));
        assert!(matches!(store.find_by_id(&id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_validation_guards_every_mutation() {
        let dir = tempdir().unwrap();
        let store = store(DatastoreOptions::in_memory(), dir.path());

        let err = store.insert(json!({ "name": "Panacea" })).await.unwrap_err();
        assert!(err.validation_report().unwrap().has_path("/price"));

        let doc = store.insert(json!({ "name": "a", "price": 1 })).await.unwrap();
        let err = store
            .update_partially(Selector::Id(doc["_id"].clone()), json!({ "price": -1 }))
            .await
            .unwrap_err();
        assert!(err.validation_report().unwrap().has_path("/price"));
        assert_eq!(store.find_by_id(&doc["_id"]).await.unwrap()["price"], 1);

        let missing = store.update(Selector::Id(json!("nope")), json!({ "name": "b", "price": 2 })).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dotted_patch_is_validated_as_written() {
        let dir = tempdir().unwrap();
        let store = store(DatastoreOptions::in_memory(), dir.path());
        let doc = store
            .insert(json!({
                "name": "a",
                "price": 1,
                "dimensions": { "length": 1, "width": 1, "height": 1 }
            }))
            .await
            .unwrap();
        let id = doc["_id"].clone();

        let err = store
            .update_partially(Selector::Id(id.clone()), json!({ "dimensions.length": "very long" }))
            .await
            .unwrap_err();
        assert!(err.validation_report().unwrap().has_path("/dimensions/length"));
        assert_eq!(store.find_by_id(&id).await.unwrap()["dimensions"]["length"], 1);

        store
            .update_partially(Selector::Id(id.clone()), json!({ "dimensions.length": 7 }))
            .await
            .unwrap();
        let stored = store.find_by_id(&id).await.unwrap();
        assert_eq!(stored["dimensions"], json!({ "length": 7, "width": 1, "height": 1 }));
    }

    #[tokio::test]
    async fn test_replacement_refuses_modifier_bodies() {
        let dir = tempdir().unwrap();
        init_test_logging();
        let open = EngineStore::new(
            "notes",
            Arc::new(Datastore::new(DatastoreOptions::in_memory())),
            None,
            dir.path(),
        );
        let doc = open.insert(json!({ "text": "a" })).await.unwrap();
        let id = doc["_id"].clone();

        let err = open
            .update(Selector::Id(id.clone()), json!({ "$set": { "text": "b" } }))
            .await
            .unwrap_err();
        assert!(err.validation_report().unwrap().has_path("/$set"));
        assert_eq!(open.find_by_id(&id).await.unwrap()["text"], "a");
    }

    #[tokio::test]
    async fn test_query_patch_validates_all_before_writing() {
        let dir = tempdir().unwrap();
        let store = store(DatastoreOptions::in_memory(), dir.path());
        store.insert(json!({ "name": "lot", "price": 1 })).await.unwrap();
        store
            .insert(json!({ "name": "lot", "price": 2, "dimensions": { "length": 1, "width": 1, "height": 1 } }))
            .await
            .unwrap();

        // Seul le second document a des dimensions : le premier deviendrait invalide.
        let err = store
            .update_partially(Selector::Query(json!({ "name": "lot" })), json!({ "dimensions.width": 3 }))
            .await
            .unwrap_err();
        assert!(err.validation_report().unwrap().has_path("/dimensions/length"));
        let all = store.find_all().await.unwrap();
        assert!(all[0].get("dimensions").is_none());
        assert_eq!(all[1]["dimensions"]["width"], 1);
    }

    #[tokio::test]
    async fn test_query_delete_and_drop() {
        let dir = tempdir().unwrap();
        let store = store(DatastoreOptions::in_memory(), dir.path());
        for price in [1, 2, 3] {
            store
                .insert(json!({ "name": "lot", "price": price }))
                .await
                .unwrap();
        }

        let opts = FindOptions::default()
            .sorted_by("price", crate::json_db::query::SortOrder::Desc)
            .skip(1);
        let page = store.find(Some(&json!({ "name": "lot" })), &opts).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["price"], 2);

        let removed = store
            .delete(Selector::Query(json!({ "name": "lot", "price": 1 })))
            .await
            .unwrap();
        assert_eq!(removed, WriteOutcome::Count(1));

        assert!(store.drop_collection().await.unwrap());
        assert!(store.find_all().await.unwrap().is_empty());
        assert_eq!(store.get_schema().await.unwrap()["title"], "Product");
    }
}
