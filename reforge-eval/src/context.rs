//! Evaluation contexts
//!
//! A context is a two-level map: context type (`user`, `team`, ...) to
//! property name to value. Criteria address properties as `type.key`.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property consulted by timed rules; always resolves to "now".
pub const CURRENT_TIME_PROPERTY: &str = "reforge.current-time";

/// A single context property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<ContextValue>),
}

impl ContextValue {
    /// Convert a JSON scalar or array; `null` and objects have no context form.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Double)),
            serde_json::Value::String(s) => Some(Self::String(s)),
            serde_json::Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is a number; integers and doubles both count.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Double(_))
    }
}

/// Renders the way a JavaScript `String(value)` would, so string coercion
/// and rollout hashing agree with the other SDKs.
impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) if d.is_nan() => f.write_str("NaN"),
            Self::Double(d) if d.is_infinite() => {
                f.write_str(if *d > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Double(d) if *d == 0.0 => f.write_str("0"),
            Self::Double(d) if d.abs() >= 1e21 || d.abs() < 1e-6 => {
                let exponential = format!("{:e}", d);
                match exponential.split_once('e') {
                    Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{}e+{}", mantissa, exp),
                    _ => f.write_str(&exponential),
                }
            }
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Properties of one context type
pub type ContextProperties = BTreeMap<String, ContextValue>;

/// A full evaluation context, keyed by context type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contexts {
    types: BTreeMap<String, ContextProperties>,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, creating its context type as needed.
    pub fn with(
        mut self,
        context_type: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Self {
        self.insert(context_type, key, value);
        self
    }

    pub fn insert(
        &mut self,
        context_type: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) {
        self.types
            .entry(context_type.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Replace a whole context type.
    pub fn set_type(&mut self, context_type: impl Into<String>, properties: ContextProperties) {
        self.types.insert(context_type.into(), properties);
    }

    /// Build from a JSON object of objects, e.g. `{"user": {"key": "abc"}}`.
    /// Properties holding `null` or nested objects are skipped.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(outer) = value else {
            return Err(EvalError::UnexpectedValue {
                key: "contexts".to_string(),
                detail: "expected an object of context types".to_string(),
            });
        };

        let mut contexts = Self::new();
        for (context_type, properties) in outer {
            let serde_json::Value::Object(properties) = properties else {
                return Err(EvalError::UnexpectedValue {
                    key: context_type,
                    detail: "expected an object of properties".to_string(),
                });
            };

            let entry = contexts.types.entry(context_type).or_default();
            for (key, value) in properties {
                if let Some(value) = ContextValue::from_json(value) {
                    entry.insert(key, value);
                }
            }
        }

        Ok(contexts)
    }

    /// Properties of a context type
    pub fn get(&self, context_type: &str) -> Option<&ContextProperties> {
        self.types.get(context_type)
    }

    /// Resolve a `type.key` property name. The name is split at the first
    /// `.`; a name without one addresses the unnamed context type `""`.
    pub fn lookup(&self, property_name: &str) -> Option<ContextValue> {
        if property_name == CURRENT_TIME_PROPERTY {
            return Some(ContextValue::Int(chrono::Utc::now().timestamp_millis()));
        }

        let (context_type, key) = property_name.split_once('.').unwrap_or(("", property_name));

        self.types.get(context_type)?.get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextProperties)> {
        self.types.iter()
    }
}

impl<'a> IntoIterator for &'a Contexts {
    type Item = (&'a String, &'a ContextProperties);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ContextProperties>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.iter()
    }
}

/// Field-level merge: every property in `overlay` is set on a copy of the
/// matching type in `base`; properties only `base` has survive.
pub fn merge_default(base: &Contexts, overlay: &Contexts) -> Contexts {
    let mut merged = base.clone();

    for (context_type, properties) in &overlay.types {
        let entry = merged.types.entry(context_type.clone()).or_default();
        for (key, value) in properties {
            entry.insert(key.clone(), value.clone());
        }
    }

    merged
}

/// Type-level replace: each context type present in `local` replaces the
/// session's type wholesale.
pub fn merge_local(session: &Contexts, local: &Contexts) -> Contexts {
    let mut merged = session.clone();

    for (context_type, properties) in &local.types {
        merged.types.insert(context_type.clone(), properties.clone());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_splits_at_first_dot() {
        let contexts = Contexts::new()
            .with("user", "email.domain", "example.com")
            .with("", "bare", 1);

        assert_eq!(
            contexts.lookup("user.email.domain"),
            Some(ContextValue::from("example.com"))
        );
        assert_eq!(contexts.lookup("bare"), Some(ContextValue::Int(1)));
        assert_eq!(contexts.lookup("user.missing"), None);
        assert_eq!(contexts.lookup("team.name"), None);
    }

    #[test]
    fn test_current_time_lookup() {
        let before = chrono::Utc::now().timestamp_millis();
        let now = match Contexts::new().lookup(CURRENT_TIME_PROPERTY) {
            Some(ContextValue::Int(ms)) => ms,
            other => panic!("unexpected {:?}", other),
        };
        assert!(now >= before);
    }

    #[test]
    fn test_merge_default_is_field_level() {
        let base = Contexts::new()
            .with("user", "name", "base")
            .with("user", "country", "US");
        let overlay = Contexts::new().with("user", "name", "overlay").with("team", "id", 3);

        let merged = merge_default(&base, &overlay);
        assert_eq!(merged.lookup("user.name"), Some("overlay".into()));
        assert_eq!(merged.lookup("user.country"), Some("US".into()));
        assert_eq!(merged.lookup("team.id"), Some(ContextValue::Int(3)));
    }

    #[test]
    fn test_merge_local_replaces_whole_type() {
        let session = Contexts::new()
            .with("user", "name", "session")
            .with("user", "country", "US")
            .with("device", "os", "linux");
        let local = Contexts::new().with("user", "name", "local");

        let merged = merge_local(&session, &local);
        assert_eq!(merged.lookup("user.name"), Some("local".into()));
        assert_eq!(merged.lookup("user.country"), None);
        assert_eq!(merged.lookup("device.os"), Some("linux".into()));

        // inputs are untouched
        assert_eq!(session.lookup("user.country"), Some("US".into()));
    }

    #[test]
    fn test_from_json() {
        let contexts = Contexts::from_json(json!({
            "user": {"key": "abc", "age": 42, "score": 1.5, "tags": ["a", "b"], "gone": null}
        }))
        .unwrap();

        assert_eq!(contexts.lookup("user.key"), Some("abc".into()));
        assert_eq!(contexts.lookup("user.age"), Some(ContextValue::Int(42)));
        assert_eq!(contexts.lookup("user.score"), Some(ContextValue::Double(1.5)));
        assert_eq!(contexts.lookup("user.tags"), Some(vec!["a", "b"].into()));
        assert_eq!(contexts.lookup("user.gone"), None);

        assert!(Contexts::from_json(json!(["user"])).is_err());
        assert!(Contexts::from_json(json!({"user": 1})).is_err());
    }

    #[test]
    fn test_display_matches_js_string_coercion() {
        assert_eq!(ContextValue::Double(1.0).to_string(), "1");
        assert_eq!(ContextValue::Double(1.5).to_string(), "1.5");
        assert_eq!(ContextValue::Double(-0.0).to_string(), "0");
        assert_eq!(ContextValue::Double(1e21).to_string(), "1e+21");
        assert_eq!(ContextValue::Double(1.5e300).to_string(), "1.5e+300");
        assert_eq!(ContextValue::Double(1e-7).to_string(), "1e-7");
        assert_eq!(ContextValue::Double(-2e-7).to_string(), "-2e-7");
        assert_eq!(ContextValue::Double(1e20).to_string(), "100000000000000000000");
        assert_eq!(ContextValue::Double(0.000001).to_string(), "0.000001");
        assert_eq!(ContextValue::Bool(false).to_string(), "false");
        assert_eq!(ContextValue::from(vec![1, 2]).to_string(), "1,2");
    }
}
