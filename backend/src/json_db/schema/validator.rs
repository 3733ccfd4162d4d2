// FICHIER : backend/src/json_db/schema/validator.rs

use super::{ValidationIssue, ValidationReport};
use regex::Regex;
use serde_json::{Map, Number, Value};

// Garde-fou contre les `$ref` cycliques.
const MAX_DEPTH: usize = 64;

/// Validateur associé au schéma d'une collection. Le schéma est figé à la
/// construction (pas de migration à chaud).
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Value,
}

impl SchemaValidator {
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validate(&self, instance: &Value) -> ValidationReport {
        validate(&self.schema, instance)
    }
}

/// Valide `document` contre `schema` et collecte toutes les violations.
pub fn validate(schema: &Value, document: &Value) -> ValidationReport {
    let mut walker = Walker {
        root: schema,
        errors: Vec::new(),
    };
    walker.check(document, schema, "", 0);
    ValidationReport::from_issues(walker.errors)
}

struct Walker<'s> {
    root: &'s Value,
    errors: Vec<ValidationIssue>,
}

impl<'s> Walker<'s> {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(path, message));
    }

    fn check(&mut self, instance: &Value, schema: &'s Value, path: &str, depth: usize) {
        if depth > MAX_DEPTH {
            self.push(path, "Profondeur maximale de schéma dépassée ($ref cyclique ?)");
            return;
        }

        let rules = match schema {
            Value::Object(rules) => rules,
            Value::Bool(false) => {
                self.push(path, "Aucune valeur n'est autorisée ici");
                return;
            }
            _ => return,
        };

        if let Some(reference) = rules.get("$ref").and_then(Value::as_str) {
            match self.resolve_ref(reference) {
                Some(target) => self.check(instance, target, path, depth + 1),
                None => self.push(
                    path,
                    format!("Référence de schéma introuvable : {}", reference),
                ),
            }
            return;
        }

        // 1. Type
        if let Some(declared) = rules.get("type") {
            let allowed: Vec<&str> = match declared {
                Value::String(t) => vec![t.as_str()],
                Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, instance)) {
                self.push(
                    path,
                    format!(
                        "Type '{}' attendu, '{}' reçu",
                        allowed.join("|"),
                        type_name(instance)
                    ),
                );
                return;
            }
        }

        // 2. Enum
        if let Some(Value::Array(options)) = rules.get("enum") {
            if !options.contains(instance) {
                self.push(path, "Valeur hors de l'énumération autorisée");
            }
        }

        // 3. Contraintes spécifiques au type
        match instance {
            Value::Number(n) => self.check_number(n, rules, path),
            Value::String(s) => self.check_string(s, rules, path),
            Value::Array(items) => self.check_array(items, rules, path, depth),
            Value::Object(map) => self.check_object(map, rules, path, depth),
            Value::Bool(_) | Value::Null => {}
        }
    }

    fn resolve_ref(&self, reference: &str) -> Option<&'s Value> {
        let fragment = reference.strip_prefix('#')?;
        if fragment.is_empty() {
            return Some(self.root);
        }
        self.root.pointer(fragment)
    }

    fn check_number(&mut self, n: &Number, rules: &Map<String, Value>, path: &str) {
        let Some(v) = n.as_f64() else {
            return;
        };

        if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
            // draft-4 : exclusiveMinimum booléen
            let exclusive = rules
                .get("exclusiveMinimum")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if (exclusive && v <= min) || v < min {
                self.push(path, format!("La valeur {} est inférieure au minimum {}", v, min));
            }
        }
        if let Some(min) = rules.get("exclusiveMinimum").and_then(Value::as_f64) {
            if v <= min {
                self.push(path, format!("La valeur {} doit être strictement supérieure à {}", v, min));
            }
        }
        if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
            let exclusive = rules
                .get("exclusiveMaximum")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if (exclusive && v >= max) || v > max {
                self.push(path, format!("La valeur {} est supérieure au maximum {}", v, max));
            }
        }
        if let Some(max) = rules.get("exclusiveMaximum").and_then(Value::as_f64) {
            if v >= max {
                self.push(path, format!("La valeur {} doit être strictement inférieure à {}", v, max));
            }
        }
    }

    fn check_string(&mut self, s: &str, rules: &Map<String, Value>, path: &str) {
        let len = s.chars().count() as u64;
        if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
            if len < min {
                self.push(path, format!("Chaîne trop courte ({} < {})", len, min));
            }
        }
        if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                self.push(path, format!("Chaîne trop longue ({} > {})", len, max));
            }
        }
        if let Some(pattern) = rules.get("pattern").and_then(Value::as_str) {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    self.push(path, format!("La chaîne ne respecte pas le motif '{}'", pattern))
                }
                Ok(_) => {}
                Err(e) => self.push(path, format!("Motif invalide '{}' : {}", pattern, e)),
            }
        }
    }

    fn check_array(
        &mut self,
        items: &[Value],
        rules: &'s Map<String, Value>,
        path: &str,
        depth: usize,
    ) {
        let len = items.len() as u64;
        if let Some(min) = rules.get("minItems").and_then(Value::as_u64) {
            if len < min {
                self.push(path, format!("Tableau trop court ({} < {})", len, min));
            }
        }
        if let Some(max) = rules.get("maxItems").and_then(Value::as_u64) {
            if len > max {
                self.push(path, format!("Tableau trop long ({} > {})", len, max));
            }
        }
        if rules.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].contains(a));
            if duplicated {
                self.push(path, "Les éléments du tableau doivent être uniques");
            }
        }

        match rules.get("items") {
            Some(Value::Array(tuple)) => {
                for (i, (item, sub)) in items.iter().zip(tuple.iter()).enumerate() {
                    self.check(item, sub, &child_path(path, &i.to_string()), depth + 1);
                }
            }
            Some(sub) => {
                for (i, item) in items.iter().enumerate() {
                    self.check(item, sub, &child_path(path, &i.to_string()), depth + 1);
                }
            }
            None => {}
        }
    }

    fn check_object(
        &mut self,
        map: &Map<String, Value>,
        rules: &'s Map<String, Value>,
        path: &str,
        depth: usize,
    ) {
        // 1. Required
        if let Some(required) = rules.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    self.push(
                        &child_path(path, key),
                        format!("Propriété obligatoire manquante : '{}'", key),
                    );
                }
            }
        }

        // 2. Properties
        let properties = rules.get("properties").and_then(Value::as_object);
        if let Some(props) = properties {
            for (key, sub) in props {
                if let Some(val) = map.get(key) {
                    self.check(val, sub, &child_path(path, key), depth + 1);
                }
            }
        }

        // 3. Pattern Properties
        let mut patterns: Vec<Regex> = Vec::new();
        if let Some(pattern_props) = rules.get("patternProperties").and_then(Value::as_object) {
            for (pattern, sub) in pattern_props {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        self.push(path, format!("Motif invalide '{}' : {}", pattern, e));
                        continue;
                    }
                };
                for (key, val) in map {
                    if re.is_match(key) {
                        self.check(val, sub, &child_path(path, key), depth + 1);
                    }
                }
                patterns.push(re);
            }
        }

        // 4. Additional Properties
        if let Some(additional) = rules.get("additionalProperties") {
            for (key, val) in map {
                let declared = properties.is_some_and(|p| p.contains_key(key));
                let matched = patterns.iter().any(|re| re.is_match(key));
                if declared || matched {
                    continue;
                }
                match additional {
                    Value::Bool(false) => self.push(
                        &child_path(path, key),
                        format!("Propriété non autorisée : '{}'", key),
                    ),
                    Value::Object(_) => {
                        self.check(val, additional, &child_path(path, key), depth + 1)
                    }
                    _ => {}
                }
            }
        }
    }
}

fn type_matches(expected: &str, instance: &Value) -> bool {
    match expected {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => instance.as_f64().is_some_and(|v| v.fract() == 0.0),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        // Type inconnu : on ne bloque pas
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Segment de pointeur JSON (RFC 6901 : `~` -> `~0`, `/` -> `~1`).
fn child_path(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, key.replace('~', "~0").replace('/', "~1"))
}

// ============================================================================
// TESTS
// ============================================================================
