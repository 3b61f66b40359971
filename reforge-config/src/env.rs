// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable loader
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load every variable under the prefix, keyed by the lower-cased
    /// remainder (`REFORGE_PROJECT_ENV_ID` -> `project_env_id`).
    pub fn load(&self) -> Result<HashMap<String, String>> {
        let mut settings = HashMap::new();

        for (key, value) in env::vars() {
            match self.prefix {
                Some(ref prefix) => {
                    if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                        settings.insert(rest.trim_start_matches('_').to_lowercase(), value);
                    }
                }
                None => {
                    settings.insert(key.to_lowercase(), value);
                }
            }
        }

        Ok(settings)
    }

    /// Load a single prefixed variable (`key` is upper-cased).
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Exact-name lookup, ignoring the prefix and case rules.
    ///
    /// Used for values a config says to take from the process environment,
    /// where the config author chose the variable name verbatim.
    pub fn lookup(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}
