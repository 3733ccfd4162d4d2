// FICHIER : backend/src/commands/rest_service.rs

use crate::json_db::catalog::Catalog;
use crate::json_db::collections::{DocumentStore, Selector};
use crate::json_db::query::FindOptions;
use crate::json_db::schema::ValidationReport;
use crate::raise_error;
use crate::utils::prelude::*;
use crate::utils::Arc;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Pseudo-document renvoyant le schéma de la collection (`GET /<c>/schema`).
pub const SCHEMA_DOCUMENT: &str = "schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(AppError::Config(format!("Méthode non supportée : {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestInfo {
    pub url: String,
    pub method: Method,
}

/// Enveloppe renvoyée pour chaque requête, succès comme échec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestResponse {
    pub request: RequestInfo,
    pub body: Value,
    pub status: u16,
}

/// Localisateur décodé : `/<collection>[/<id>][?k=v&…]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    pub collection: String,
    pub document_id: Option<String>,
    pub query: Vec<(String, String)>,
}

pub fn parse_url(raw: &str) -> Result<ParsedUrl> {
    let base = match Url::parse("websemble://local/") {
        Ok(base) => base,
        Err(e) => raise_error!(AppError::System(anyhow::anyhow!(e))),
    };
    let url = match base.join(raw.trim()) {
        Ok(url) => url,
        Err(e) => raise_error!(AppError::Validation(ValidationReport::single(
            "",
            format!("URL invalide '{}' : {}", raw, e)
        ))),
    };

    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let Some(collection) = segments.first().cloned() else {
        raise_error!(AppError::Validation(ValidationReport::single(
            "",
            format!("Aucune collection dans l'URL '{}'", raw)
        )));
    };

    Ok(ParsedUrl {
        collection,
        document_id: segments.get(1..).and_then(|rest| rest.last().cloned()),
        query: url.query_pairs().map(|(k, v)| (k.trim().to_string(), v.trim().to_string())).collect(),
    })
}

/// Convertit les paramètres de requête selon le type déclaré dans le schéma.
pub fn coerce_query(pairs: &[(String, String)], schema: &Value) -> Value {
    let mut condition = Map::new();
    for (key, raw) in pairs {
        let declared = declared_types(schema, key);
        let value = if declared.contains(&"string") {
            json!(raw)
        } else if declared.iter().any(|t| *t == "number" || *t == "integer") {
            parse_number(raw).unwrap_or_else(|| json!(raw))
        } else if declared.contains(&"boolean") {
            match raw.as_str() {
                "true" => json!(true),
                "false" => json!(false),
                _ => json!(raw),
            }
        } else {
            json!(raw)
        };
        condition.insert(key.clone(), value);
    }
    Value::Object(condition)
}

fn declared_types<'a>(schema: &'a Value, key: &str) -> Vec<&'a str> {
    match schema.get("properties").and_then(|p| p.get(key)).and_then(|p| p.get("type")) {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(json!(i));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| json!(f))
}

/// Aiguillage des requêtes de type REST vers les collections du catalogue.
#[derive(Debug, Clone)]
pub struct RestService {
    catalog: Arc<Catalog>,
}

impl RestService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Traite une requête ; les erreurs deviennent un corps `{kind, message, errors?}`.
    pub async fn handle(&self, method: Method, url: &str, body: Option<Value>) -> RestResponse {
        let request = RequestInfo {
            url: url.to_string(),
            method,
        };
        let (body, status) = match self.dispatch(method, url, body).await {
            Ok(result) => {
                let status = if method == Method::Post { 201 } else { 200 };
                (result, status)
            }
            Err(e) => (e.to_body(), e.status_code()),
        };
        info!(%method, url, status, "Requête traitée");
        RestResponse {
            request,
            body,
            status,
        }
    }

    pub async fn handle_get(&self, url: &str) -> RestResponse {
        self.handle(Method::Get, url, None).await
    }

    pub async fn handle_post(&self, url: &str, data: Value) -> RestResponse {
        self.handle(Method::Post, url, Some(data)).await
    }

    pub async fn handle_put(&self, url: &str, data: Value) -> RestResponse {
        self.handle(Method::Put, url, Some(data)).await
    }

    pub async fn handle_patch(&self, url: &str, data: Value) -> RestResponse {
        self.handle(Method::Patch, url, Some(data)).await
    }

    pub async fn handle_delete(&self, url: &str) -> RestResponse {
        self.handle(Method::Delete, url, None).await
    }

    async fn dispatch(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
        let parsed = parse_url(url)?;
        let store = self.catalog.get_collection(&parsed.collection)?;

        match method {
            Method::Get => self.get(store.as_ref(), &parsed).await,
            Method::Post => store.insert(require_body(body)?).await,
            Method::Put => {
                let selector = self.selector(store.as_ref(), &parsed).await?;
                Ok(store.update(selector, require_body(body)?).await?.into_value())
            }
            Method::Patch => {
                let selector = self.selector(store.as_ref(), &parsed).await?;
                Ok(store
                    .update_partially(selector, require_body(body)?)
                    .await?
                    .into_value())
            }
            Method::Delete => {
                let selector = self.selector(store.as_ref(), &parsed).await?;
                Ok(store.delete(selector).await?.into_value())
            }
        }
    }

    async fn get(&self, store: &dyn DocumentStore, parsed: &ParsedUrl) -> Result<Value> {
        match parsed.document_id.as_deref() {
            Some(SCHEMA_DOCUMENT) => store.get_schema().await,
            Some(id) => {
                let query = json!({ store.identity_field(): id });
                match store.find_one(&query).await? {
                    Some(doc) => Ok(doc),
                    None => raise_error!(AppError::NotFound(format!(
                        "Document {} absent de la collection {}",
                        id,
                        store.name()
                    ))),
                }
            }
            None if parsed.query.is_empty() => Ok(Value::Array(store.find_all().await?)),
            None => {
                let condition = coerce_query(&parsed.query, &store.get_schema().await?);
                let docs = store.find(Some(&condition), &FindOptions::default()).await?;
                Ok(Value::Array(docs))
            }
        }
    }

    async fn selector(&self, store: &dyn DocumentStore, parsed: &ParsedUrl) -> Result<Selector> {
        if let Some(id) = &parsed.document_id {
            return Ok(Selector::Id(json!(id)));
        }
        if !parsed.query.is_empty() {
            let schema = store.get_schema().await?;
            return Ok(Selector::Query(coerce_query(&parsed.query, &schema)));
        }
        raise_error!(AppError::Validation(ValidationReport::single(
            "",
            format!("Identifiant ou requête requis pour {}", store.name())
        )))
    }
}

fn require_body(body: Option<Value>) -> Result<Value> {
    match body {
        Some(b) => Ok(b),
        None => raise_error!(AppError::Validation(ValidationReport::single(
            "",
            "Corps de requête manquant"
        ))),
    }
}
