//! Requêtes : conditions (Matcher) et options de lecture (tri, pagination)

use crate::utils::json::{self, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub mod matcher;

pub use matcher::{loose_eq, Condition, Matcher};

/// Options appliquées après filtrage, dans l'ordre : tri, saut, limite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub sort: Option<Vec<SortField>>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FindOptions {
    pub fn is_empty(&self) -> bool {
        self.sort.is_none() && self.skip.is_none() && self.limit.is_none()
    }

    pub fn sorted_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.get_or_insert_with(Vec::new).push(SortField {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Tri (stable), puis saut, puis limite.
    pub fn apply(&self, mut documents: Vec<Value>) -> Vec<Value> {
        if let Some(sort_fields) = &self.sort {
            documents.sort_by(|a, b| compare_docs(a, b, sort_fields));
        }
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        documents.into_iter().skip(skip).take(limit).collect()
    }
}

fn compare_docs(a: &Value, b: &Value, sort_fields: &[SortField]) -> Ordering {
    for s in sort_fields {
        let cmp = compare_values(json::get_path(a, &s.field), json::get_path(b, &s.field));
        if cmp != Ordering::Equal {
            return match s.order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
        }
    }
    Ordering::Equal
}

// Champ absent < null < nombres < chaînes < booléens < tableaux < objets
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordre total entre valeurs JSON, utilisé par le tri.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(v1), Some(v2)) => {
            if let (Some(n1), Some(n2)) = (v1.as_f64(), v2.as_f64()) {
                return n1.partial_cmp(&n2).unwrap_or(Ordering::Equal);
            }
            if let (Some(s1), Some(s2)) = (v1.as_str(), v2.as_str()) {
                return s1.cmp(s2);
            }
            if let (Some(b1), Some(b2)) = (v1.as_bool(), v2.as_bool()) {
                return b1.cmp(&b2);
            }
            type_rank(v1).cmp(&type_rank(v2))
        }
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<Value> {
        vec![
            json!({ "id": 1, "name": "b", "price": 20 }),
            json!({ "id": 2, "name": "a", "price": 10.5 }),
            json!({ "id": 3, "name": "c" }),
            json!({ "id": 4, "name": "d", "price": 10.5 }),
        ]
    }

    fn ids(docs: &[Value]) -> Vec<i64> {
        docs.iter().filter_map(|d| d["id"].as_i64()).collect()
    }

    #[test]
    fn test_sort_is_stable_and_missing_first() {
        let sorted = FindOptions::default()
            .sorted_by("price", SortOrder::Asc)
            .apply(docs());
        assert_eq!(ids(&sorted), vec![3, 2, 4, 1]);

        let desc = FindOptions::default()
            .sorted_by("price", SortOrder::Desc)
            .apply(docs());
        assert_eq!(ids(&desc), vec![1, 2, 4, 3]);
    }

    #[test]
    fn test_skip_then_limit() {
        let page = FindOptions::default()
            .sorted_by("name", SortOrder::Asc)
            .skip(1)
            .limit(2)
            .apply(docs());
        assert_eq!(ids(&page), vec![1, 3]);

        assert!(FindOptions::default().skip(10).apply(docs()).is_empty());
        assert!(FindOptions::default().is_empty());
    }

    #[test]
    fn test_options_deserialize() {
        let opts: FindOptions = serde_json::from_value(json!({
            "sort": [{ "field": "price", "order": "desc" }],
            "limit": 1
        }))
        .unwrap();
        assert_eq!(opts.limit, Some(1));
        assert_eq!(opts.sort.unwrap()[0].order, SortOrder::Desc);
    }
}
