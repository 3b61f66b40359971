//! Resolved values
//!
//! What a lookup hands back to callers once a config value has been
//! matched and unwrapped.

use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete, decoded value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    LogLevel(LogLevel),
    Json(serde_json::Value),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers are widened.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(list) => Some(list),
            _ => None,
        }
    }

    /// Log level, either stored as such or as its name.
    pub fn as_log_level(&self) -> Option<LogLevel> {
        match self {
            Self::LogLevel(level) => Some(*level),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(json) => Some(json),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => f.write_str(s),
            Self::StringList(list) => f.write_str(&list.join(",")),
            Self::LogLevel(level) => write!(f, "{}", level),
            Self::Json(json) => write!(f, "{}", json),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<LogLevel> for Value {
    fn from(value: LogLevel) -> Self {
        Self::LogLevel(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7).as_int(), Some(7));
        assert_eq!(Value::from(7).as_double(), Some(7.0));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from("x").as_bool(), None);
    }

    #[test]
    fn test_log_level_from_string() {
        assert_eq!(Value::from("debug").as_log_level(), Some(LogLevel::Debug));
        assert_eq!(Value::from(LogLevel::Warn).as_log_level(), Some(LogLevel::Warn));
        assert_eq!(Value::from("loud").as_log_level(), None);
    }

    #[test]
    fn test_display() {
        let list = Value::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(list.to_string(), "a,b");
        assert_eq!(Value::from(LogLevel::Info).to_string(), "INFO");
    }
}
