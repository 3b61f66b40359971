//! Evaluation
//!
//! Runs the rule matcher and the unwrapper for a single config and reports
//! where the answer came from.

use crate::context::Contexts;
use crate::encryption::Decryptor;
use crate::error::Result;
use crate::rows::matching_config_value;
use crate::types::{ConfigType, RuntimeConfig, ValueKind, ValueType};
use crate::unwrap::unwrap;
use crate::value::Value;
use serde::Serialize;

/// Index reported when no row or conditional value matched
pub const NO_MATCH: i32 = -1;

/// What evaluation needs from its owner: segment and decryption-key lookups
/// go back through the resolver, `provided` values through the environment.
pub trait EvalHost {
    /// Whether a config is stored under `key`
    fn contains(&self, key: &str) -> bool;

    /// Resolve `key` with the owner's missing-key policy. `contexts`, when
    /// given, is merged over the owner's session context.
    fn resolve(&self, key: &str, contexts: Option<&Contexts>) -> Result<Option<Value>>;

    /// Exact-name environment lookup
    fn env_var(&self, name: &str) -> Option<String>;

    fn decryptor(&self) -> &dyn Decryptor;
}

/// Where to evaluate: the resolver's environment and namespace plus the
/// effective context.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub project_env_id: i64,
    pub namespace: Option<&'a str>,
    pub contexts: &'a Contexts,
    pub host: &'a dyn EvalHost,
}

/// The result of evaluating one config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub config_id: Option<String>,
    pub config_key: String,
    pub config_type: ConfigType,
    pub value_type: ValueType,
    pub unwrapped_value: Option<Value>,
    pub reportable_value: Option<String>,
    pub conditional_value_index: i32,
    pub config_row_index: i32,
    pub weighted_value_index: Option<usize>,
}

impl Evaluation {
    pub fn matched(&self) -> bool {
        self.config_row_index != NO_MATCH
    }
}

/// Evaluate `config` in `scope`.
pub fn evaluate(config: &RuntimeConfig, scope: &Scope<'_>) -> Result<Evaluation> {
    let matched = matching_config_value(&config.rows, scope)?;

    let hash_by_value = matched.value.and_then(|value| match value.kind {
        ValueKind::WeightedValues(ref weighted) => weighted
            .hash_by_property_name
            .as_deref()
            .and_then(|name| scope.contexts.lookup(name))
            .map(|v| v.to_string()),
        _ => None,
    });

    let unwrapped = unwrap(
        &config.key,
        matched.value,
        Some(config),
        hash_by_value.as_deref(),
        Some(scope.host),
    )?;

    Ok(Evaluation {
        config_id: config.id.clone(),
        config_key: config.key.clone(),
        config_type: config.config_type,
        value_type: config.value_type,
        unwrapped_value: unwrapped.value,
        reportable_value: unwrapped.reportable_value,
        conditional_value_index: matched.conditional_value_index,
        config_row_index: matched.config_row_index,
        weighted_value_index: unwrapped.weighted_value_index,
    })
}
