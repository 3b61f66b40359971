//! Environment sources for `provided` values

use reforge_config::{EnvLoader, ENV_PREFIX};
use std::collections::HashMap;

/// Looks up environment variables by exact name
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone)]
pub struct ProcessEnv {
    loader: EnvLoader,
}

impl Default for ProcessEnv {
    fn default() -> Self {
        Self {
            loader: EnvLoader::new(Some(ENV_PREFIX.to_string())),
        }
    }
}

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.loader.lookup(name)
    }
}

/// A fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env() {
        let env = MapEnv::new().with("A", "1");
        assert_eq!(env.var("A").as_deref(), Some("1"));
        assert_eq!(env.var("a"), None);

        let env: MapEnv = [("B", "2")].into_iter().collect();
        assert_eq!(env.var("B").as_deref(), Some("2"));
    }

    #[test]
    fn test_process_env_is_exact() {
        unsafe {
            std::env::set_var("REFORGE_EVAL_ENV_TEST", "present");
        }

        let env = ProcessEnv::default();
        assert_eq!(env.var("REFORGE_EVAL_ENV_TEST").as_deref(), Some("present"));
        assert_eq!(env.var("EVAL_ENV_TEST"), None);

        unsafe {
            std::env::remove_var("REFORGE_EVAL_ENV_TEST");
        }
    }
}
