// FICHIER : backend/src/json_db/query/matcher.rs

use crate::utils::json::{self, Map, Value};
use std::fmt;

/// Condition compilée une fois pour toutes à partir de l'objet `{champ: valeur}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Égalité lâche ; contre un tableau, vaut « le tableau contient ».
    Equals { field: String, value: Value },
    /// Appartenance stricte : le champ doit être un tableau contenant `value`.
    ArrayContains { field: String, value: Value },
    And(Vec<Condition>),
    /// Opérateur réservé (`$elemMatch`, ...) ou forme non gérée : ne correspond jamais.
    Unsupported { field: String, operator: String },
}

impl Condition {
    /// Compile un objet de condition. `null` correspond à tout document.
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Null => Condition::And(Vec::new()),
            Value::Object(fields) => Condition::And(
                fields
                    .iter()
                    .map(|(field, expected)| Self::parse_field(field, expected))
                    .collect(),
            ),
            _ => Condition::Unsupported {
                field: String::new(),
                operator: "condition non objet".to_string(),
            },
        }
    }

    fn parse_field(field: &str, expected: &Value) -> Self {
        if field.starts_with('$') {
            return Condition::Unsupported {
                field: field.to_string(),
                operator: field.to_string(),
            };
        }
        match expected {
            Value::Object(obj) => Condition::Unsupported {
                field: field.to_string(),
                operator: operator_of(obj).unwrap_or("égalité d'objets").to_string(),
            },
            Value::Array(_) => Condition::Unsupported {
                field: field.to_string(),
                operator: "égalité de tableaux".to_string(),
            },
            scalar => Condition::Equals {
                field: field.to_string(),
                value: scalar.clone(),
            },
        }
    }

    pub fn evaluate(&self, doc: &Value) -> bool {
        match self {
            Condition::Equals { field, value } => match lookup(doc, field) {
                Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, value)),
                Some(actual) => loose_eq(actual, value),
                None => false,
            },
            Condition::ArrayContains { field, value } => match lookup(doc, field) {
                Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, value)),
                _ => false,
            },
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(doc)),
            Condition::Unsupported { .. } => false,
        }
    }

    fn unsupported(&self) -> Vec<(&str, &str)> {
        match self {
            Condition::Unsupported { field, operator } => vec![(field.as_str(), operator.as_str())],
            Condition::And(conditions) => conditions.iter().flat_map(|c| c.unsupported()).collect(),
            _ => Vec::new(),
        }
    }
}

fn operator_of(obj: &Map<String, Value>) -> Option<&str> {
    obj.keys().find(|k| k.starts_with('$')).map(String::as_str)
}

// Clé littérale d'abord (un nom de champ peut contenir un point), puis notation pointée.
fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    doc.get(field).or_else(|| json::get_path(doc, field))
}

/// Égalité « lâche » entre scalaires JSON.
///
/// Les nombres se comparent par valeur ; une chaîne et un nombre sont égaux
/// quand la chaîne (sans espaces) se lit comme ce nombre (`"12.50" == 12.5`).
/// Les chaînes, booléens et `null` ne sont égaux qu'à eux-mêmes.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Number(_), Value::String(_)) => match (numeric_of(a), numeric_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// Valeur numérique d'un nombre ou d'une chaîne numérique. Les entiers
/// restent exacts ; un flottant entier sous 2^53 est ramené à un entier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i128),
    Float(f64),
}

const MAX_SAFE_FLOAT: f64 = 9_007_199_254_740_992.0;

impl Numeric {
    fn from_f64(n: f64) -> Option<Self> {
        if !n.is_finite() {
            return None;
        }
        if n.fract() == 0.0 && n.abs() <= MAX_SAFE_FLOAT {
            Some(Numeric::Int(n as i128))
        } else {
            Some(Numeric::Float(n))
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Int(i) => write!(f, "{}", i),
            Numeric::Float(x) => write!(f, "{}", x),
        }
    }
}

pub fn numeric_of(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Numeric::Int(i as i128))
            } else if let Some(u) = n.as_u64() {
                Some(Numeric::Int(u as i128))
            } else {
                n.as_f64().and_then(Numeric::from_f64)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i128>() {
                Ok(i) => Some(Numeric::Int(i)),
                Err(_) => s.parse::<f64>().ok().and_then(Numeric::from_f64),
            }
        }
        _ => None,
    }
}

/// Évalue une condition de requête contre des documents.
#[derive(Debug, Clone)]
pub struct Matcher {
    condition: Condition,
}

impl Matcher {
    pub fn new(raw: &Value) -> Self {
        let condition = Condition::parse(raw);
        for (field, operator) in condition.unsupported() {
            tracing::debug!(field, operator, "Opérateur de requête non supporté : aucun résultat");
        }
        Self { condition }
    }

    pub fn from_condition(condition: Condition) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.condition.evaluate(doc)
    }

    /// Valeur cherchée si la condition est exactement `{identity_field: valeur}`.
    pub fn identity_lookup(&self, identity_field: &str) -> Option<&Value> {
        let single = match &self.condition {
            Condition::And(conditions) if conditions.len() == 1 => &conditions[0],
            other => other,
        };
        match single {
            Condition::Equals { field, value } if field == identity_field => Some(value),
            _ => None,
        }
    }
}
