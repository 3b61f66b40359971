// Resolver settings for the Reforge SDK

pub mod env;
pub mod error;
pub mod loader;
pub mod settings_service;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{FileFormat, SettingsLoader};
pub use settings_service::{SettingsService, SettingsServiceBuilder};
pub use validation::{SettingsValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix for environment variables read by [`SettingsManager::load_env`].
pub const ENV_PREFIX: &str = "REFORGE";

/// Config key consulted by exact-match log-level lookups.
pub const DEFAULT_LOGGER_KEY: &str = "log-levels.default";

/// What `get` does when a key is missing and the caller supplied no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnNoDefault {
    /// Return an error
    #[default]
    Error,
    /// Log a warning and return nothing
    Warn,
    /// Silently return nothing
    Ignore,
}

impl OnNoDefault {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnNoDefault::Error => "error",
            OnNoDefault::Warn => "warn",
            OnNoDefault::Ignore => "ignore",
        }
    }
}

impl fmt::Display for OnNoDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnNoDefault {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(OnNoDefault::Error),
            "warn" => Ok(OnNoDefault::Warn),
            "ignore" => Ok(OnNoDefault::Ignore),
            other => Err(ConfigError::ValidationError(format!(
                "on_no_default must be one of error, warn, ignore (got {})",
                other
            ))),
        }
    }
}

/// Everything a resolver needs besides its configs and contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Rows scoped to this environment are evaluated first
    pub project_env_id: i64,
    /// Compared against `HIERARCHICAL_MATCH` criteria
    pub namespace: Option<String>,
    /// Policy for missing keys without a default
    pub on_no_default: OnNoDefault,
    /// Config key used by exact-match log-level lookups
    pub logger_key: Option<String>,
    /// Level used by hierarchical log-level lookups when nothing matches
    pub default_log_level: String,
    /// Whether `should_log` reports logger names to telemetry
    pub collect_logger_counts: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            project_env_id: 0,
            namespace: None,
            on_no_default: OnNoDefault::Error,
            logger_key: Some(DEFAULT_LOGGER_KEY.to_string()),
            default_log_level: "WARN".to_string(),
            collect_logger_counts: true,
        }
    }
}

impl ResolverSettings {
    /// Read settings out of a manager, falling back to defaults for
    /// anything absent. Values loaded from the environment arrive as
    /// strings, so numbers and booleans are accepted in either form.
    pub fn from_manager(manager: &SettingsManager) -> Result<Self> {
        let defaults = Self::default();

        let project_env_id = match manager.raw("project_env_id") {
            None => defaults.project_env_id,
            Some(serde_json::Value::Number(n)) => n.as_i64().ok_or_else(|| {
                ConfigError::ValidationError(format!("project_env_id must be an integer, got {}", n))
            })?,
            Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("project_env_id must be an integer, got {}", s))
            })?,
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "project_env_id must be an integer, got {}",
                    other
                )));
            }
        };

        let on_no_default = match manager.get::<String>("on_no_default") {
            Ok(raw) => raw.parse()?,
            Err(ConfigError::KeyNotFound(_)) => defaults.on_no_default,
            Err(e) => return Err(e),
        };

        let collect_logger_counts = match manager.raw("collect_logger_counts") {
            None => defaults.collect_logger_counts,
            Some(serde_json::Value::Bool(b)) => b,
            Some(serde_json::Value::String(s)) => {
                matches!(s.to_lowercase().as_str(), "1" | "true" | "yes")
            }
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "collect_logger_counts must be a boolean, got {}",
                    other
                )));
            }
        };

        let settings = Self {
            project_env_id,
            namespace: manager.get::<String>("namespace").ok(),
            on_no_default,
            logger_key: manager
                .get::<String>("logger_key")
                .ok()
                .or(defaults.logger_key),
            default_log_level: manager
                .get::<String>("default_log_level")
                .map(|level| level.to_uppercase())
                .unwrap_or(defaults.default_log_level),
            collect_logger_counts,
        };

        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for ResolverSettings {
    fn validate(&self) -> Result<()> {
        if let Some(ref namespace) = self.namespace {
            SettingsValidator::not_empty(namespace, "namespace")?;
        }
        if let Some(ref logger_key) = self.logger_key {
            SettingsValidator::not_empty(logger_key, "logger_key")?;
        }
        SettingsValidator::log_level(&self.default_log_level, "default_log_level")
    }
}

/// Layered raw settings: later loads overwrite earlier ones key by key.
#[derive(Clone, Default)]
pub struct SettingsManager {
    values: Arc<RwLock<HashMap<String, serde_json::Value>>>,
    env_prefix: Option<String>,
}

impl SettingsManager {
    /// Create a new, empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load settings from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;

        let mut values = self.values.write();
        for (key, value) in env_vars {
            values.insert(key, serde_json::Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then read it back
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                if dotenvy::dotenv().is_err() {
                    reforge_log::debug!("no .env file found; skipping");
                }
            }
        }
        self.load_env()
    }

    /// Load settings from a file
    pub fn load_file(&self, path: &str, format: FileFormat) -> Result<()> {
        let data = SettingsLoader::new(format).load_file(path)?;
        self.merge_value(data)
    }

    /// Merge the top-level keys of a JSON object
    pub fn merge_value(&self, data: serde_json::Value) -> Result<()> {
        let serde_json::Value::Object(map) = data else {
            return Err(ConfigError::ParseError(
                "settings must be a table of key/value pairs".to_string(),
            ));
        };

        let mut values = self.values.write();
        for (key, value) in map {
            values.insert(key, value);
        }
        Ok(())
    }

    /// Set a single value
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.values.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .raw(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get the untyped value
    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().get(key).cloned()
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Build validated resolver settings from what has been loaded
    pub fn resolver_settings(&self) -> Result<ResolverSettings> {
        ResolverSettings::from_manager(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SettingsManager::new().resolver_settings().unwrap();

        assert_eq!(settings, ResolverSettings::default());
        assert_eq!(settings.logger_key.as_deref(), Some(DEFAULT_LOGGER_KEY));
        assert_eq!(settings.on_no_default, OnNoDefault::Error);
    }

    #[test]
    fn test_string_values_are_coerced() {
        let manager = SettingsManager::new();
        manager.set("project_env_id", "5").unwrap();
        manager.set("on_no_default", "WARN").unwrap();
        manager.set("collect_logger_counts", "false").unwrap();
        manager.set("default_log_level", "info").unwrap();

        let settings = manager.resolver_settings().unwrap();
        assert_eq!(settings.project_env_id, 5);
        assert_eq!(settings.on_no_default, OnNoDefault::Warn);
        assert!(!settings.collect_logger_counts);
        assert_eq!(settings.default_log_level, "INFO");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let manager = SettingsManager::new();
        manager.set("project_env_id", "five").unwrap();
        assert!(manager.resolver_settings().is_err());

        let manager = SettingsManager::new();
        manager.set("on_no_default", "panic").unwrap();
        assert!(matches!(
            manager.resolver_settings(),
            Err(ConfigError::ValidationError(_))
        ));

        let manager = SettingsManager::new();
        manager.set("default_log_level", "chatty").unwrap();
        assert!(manager.resolver_settings().is_err());
    }

    #[test]
    fn test_merge_value_requires_object() {
        let manager = SettingsManager::new();
        assert!(manager.merge_value(serde_json::json!([1, 2])).is_err());
        manager
            .merge_value(serde_json::json!({"namespace": "billing"}))
            .unwrap();
        assert!(manager.has("namespace"));
    }

    #[test]
    fn test_on_no_default_round_trips_through_serde() {
        let parsed: OnNoDefault = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(parsed, OnNoDefault::Ignore);
        assert_eq!(serde_json::to_string(&OnNoDefault::Warn).unwrap(), "\"warn\"");
        assert_eq!("Error".parse::<OnNoDefault>().unwrap(), OnNoDefault::Error);
    }
}
