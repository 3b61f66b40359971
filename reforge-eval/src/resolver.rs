//! Resolver
//!
//! Owns the config map and the session context, applies the missing-key
//! policy and runs evaluation for each lookup.

use crate::context::{merge_default, merge_local, Contexts};
use crate::encryption::{AesGcmDecryptor, Decryptor};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{EvalError, Result};
use crate::evaluation::{evaluate, EvalHost, Evaluation, Scope};
use crate::notifier::ConfigSource;
use crate::telemetry::Telemetry;
use crate::types::{ConfigValue, RuntimeConfig};
use crate::value::Value;
use reforge_config::{OnNoDefault, ResolverSettings};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Called after every [`Resolver::update`] with the resolver and the batch
pub type OnUpdate = Arc<dyn Fn(&dyn ConfigSource, &[RuntimeConfig]) + Send + Sync>;

/// Host refresh hook behind [`Resolver::update_if_staler_than`]
pub type StalenessHook = Arc<dyn Fn(Duration) + Send + Sync>;

/// The caller's default for a lookup.
///
/// `NotProvided` is different from `Provided(None)`: only the former
/// applies the missing-key policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultValue {
    #[default]
    NotProvided,
    Provided(Option<Value>),
}

impl DefaultValue {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Provided(Some(value.into()))
    }
}

/// Evaluates configs against contexts
pub struct Resolver {
    id: Uuid,
    configs: HashMap<String, RuntimeConfig>,
    settings: ResolverSettings,
    contexts: Contexts,
    default_context: Contexts,
    global_context: Contexts,
    decryptor: Arc<dyn Decryptor>,
    env: Arc<dyn EnvSource>,
    telemetry: Option<Arc<dyn Telemetry>>,
    on_update: Option<OnUpdate>,
    staleness_hook: Option<StalenessHook>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("id", &self.id)
            .field("configs", &self.configs.len())
            .field("settings", &self.settings)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}

fn session_contexts(global: &Contexts, contexts: &Contexts, default: &Contexts) -> Contexts {
    merge_default(global, &merge_default(contexts, default))
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    /// A resolver over `configs` with the given settings and no context
    pub fn new<I>(configs: I, settings: ResolverSettings) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RuntimeConfig>,
    {
        Self::builder().configs(configs).settings(settings).build()
    }

    /// Unique per instance, including clones
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// The session context every lookup starts from
    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    /// Apply a batch: tombstones delete, everything else upserts by key.
    /// `default_context` is folded into the session context field by field.
    pub fn update<I>(&mut self, configs: I, default_context: Option<&Contexts>)
    where
        I: IntoIterator,
        I::Item: Into<RuntimeConfig>,
    {
        let batch: Vec<RuntimeConfig> = configs.into_iter().map(Into::into).collect();

        for config in &batch {
            if config.is_tombstone() {
                self.configs.remove(&config.key);
            } else {
                self.configs.insert(config.key.clone(), config.clone());
            }
        }

        if let Some(default_context) = default_context {
            self.contexts = merge_default(&self.contexts, default_context);
        }

        if let Some(on_update) = self.on_update.clone() {
            on_update(&*self, &batch);
        }
    }

    /// Replace `key` with a single unconditional value
    pub fn set(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        let config = RuntimeConfig::builder(key).value(value)?;
        self.configs.insert(key.to_string(), config);
        Ok(())
    }

    pub fn raw(&self, key: &str) -> Option<&RuntimeConfig> {
        self.configs.get(key)
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.configs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Look up `key` with the resolver's missing-key policy
    pub fn get(&self, key: &str, contexts: Option<&Contexts>) -> Result<Option<Value>> {
        self.get_with(key, contexts, DefaultValue::NotProvided, None)
    }

    /// Look up `key`, answering `default` when it is not stored
    pub fn get_or(&self, key: &str, contexts: Option<&Contexts>, default: impl Into<Value>) -> Result<Option<Value>> {
        self.get_with(key, contexts, DefaultValue::value(default), None)
    }

    /// Look up `key`. `contexts` replaces whole context types of the
    /// session context; `on_no_default` overrides the resolver's policy.
    pub fn get_with(
        &self,
        key: &str,
        contexts: Option<&Contexts>,
        default: DefaultValue,
        on_no_default: Option<OnNoDefault>,
    ) -> Result<Option<Value>> {
        let Some(config) = self.configs.get(key) else {
            return match default {
                DefaultValue::Provided(value) => Ok(value),
                DefaultValue::NotProvided => match on_no_default.unwrap_or(self.settings.on_no_default) {
                    OnNoDefault::Error => Err(EvalError::KeyNotFound(key.to_string())),
                    OnNoDefault::Warn => {
                        reforge_log::warn!("No value found for key '{}'", key);
                        Ok(None)
                    }
                    OnNoDefault::Ignore => Ok(None),
                },
            };
        };

        Ok(self.evaluate_config(config, contexts)?.unwrapped_value)
    }

    /// Full evaluation of `key`, or `None` if it isn't stored
    pub fn evaluate(&self, key: &str, contexts: Option<&Contexts>) -> Result<Option<Evaluation>> {
        self.configs
            .get(key)
            .map(|config| self.evaluate_config(config, contexts))
            .transpose()
    }

    fn evaluate_config(&self, config: &RuntimeConfig, contexts: Option<&Contexts>) -> Result<Evaluation> {
        let contexts = match contexts {
            Some(local) => merge_local(&self.contexts, local),
            None => self.contexts.clone(),
        };

        // only backend-delivered configs are reported
        let telemetry = self.telemetry.as_ref().filter(|_| config.id.is_some());
        if let Some(telemetry) = telemetry {
            telemetry.record_context(&contexts);
        }

        let scope = Scope {
            project_env_id: self.settings.project_env_id,
            namespace: self.settings.namespace.as_deref(),
            contexts: &contexts,
            host: self,
        };
        let evaluation = evaluate(config, &scope)?;

        if let Some(telemetry) = telemetry {
            telemetry.record_evaluation(&evaluation);
        }

        Ok(evaluation)
    }

    /// Boolean flag check. Accepts `"true"`/`"false"` strings; anything
    /// else, including a failed lookup, is `false`.
    pub fn is_feature_enabled(&self, key: &str, contexts: Option<&Contexts>) -> bool {
        match self.get(key, contexts) {
            Ok(Some(Value::Bool(enabled))) => enabled,
            Ok(Some(Value::String(s))) if s == "true" || s == "false" => s == "true",
            Ok(other) => {
                reforge_log::warn!(
                    "Expected boolean value for key {}, got {:?}. Non-boolean flags return false for is_feature_enabled checks.",
                    key,
                    other
                );
                false
            }
            Err(e) => {
                reforge_log::warn!("is_feature_enabled({}) failed: {}", key, e);
                false
            }
        }
    }

    /// A point-in-time copy scoped to `contexts`. Later updates on either
    /// side are not shared; hooks and collaborators are.
    ///
    /// Cloning does not call `on_update`. A host tracking the clone with a
    /// [`ConfigChangeNotifier`](crate::notifier::ConfigChangeNotifier)
    /// should `init` it against the clone itself.
    pub fn clone_with_context(&self, contexts: &Contexts) -> Resolver {
        Resolver {
            id: Uuid::new_v4(),
            configs: self.configs.clone(),
            settings: self.settings.clone(),
            contexts: session_contexts(&self.global_context, contexts, &self.default_context),
            default_context: self.default_context.clone(),
            global_context: self.global_context.clone(),
            decryptor: Arc::clone(&self.decryptor),
            env: Arc::clone(&self.env),
            telemetry: self.telemetry.clone(),
            on_update: self.on_update.clone(),
            staleness_hook: self.staleness_hook.clone(),
        }
    }

    pub fn with_context(&self, contexts: &Contexts) -> Resolver {
        self.clone_with_context(contexts)
    }

    pub fn set_on_update<F>(&mut self, on_update: F)
    where
        F: Fn(&dyn ConfigSource, &[RuntimeConfig]) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(on_update));
    }

    /// Ask the host to refresh if its data is older than `max_age`
    pub fn update_if_staler_than(&self, max_age: Duration) {
        if let Some(ref hook) = self.staleness_hook {
            hook(max_age);
        }
    }

    pub(crate) fn telemetry(&self) -> Option<&Arc<dyn Telemetry>> {
        self.telemetry.as_ref()
    }
}

impl ConfigSource for Resolver {
    fn keys(&self) -> Vec<String> {
        Resolver::keys(self)
    }

    fn raw(&self, key: &str) -> Option<&RuntimeConfig> {
        Resolver::raw(self, key)
    }
}

impl EvalHost for Resolver {
    fn contains(&self, key: &str) -> bool {
        self.configs.contains_key(key)
    }

    fn resolve(&self, key: &str, contexts: Option<&Contexts>) -> Result<Option<Value>> {
        self.get(key, contexts)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.var(name)
    }

    fn decryptor(&self) -> &dyn Decryptor {
        self.decryptor.as_ref()
    }
}

/// Builder for [`Resolver`]
pub struct ResolverBuilder {
    configs: Vec<RuntimeConfig>,
    settings: ResolverSettings,
    contexts: Contexts,
    default_context: Contexts,
    global_context: Contexts,
    decryptor: Arc<dyn Decryptor>,
    env: Arc<dyn EnvSource>,
    telemetry: Option<Arc<dyn Telemetry>>,
    on_update: Option<OnUpdate>,
    staleness_hook: Option<StalenessHook>,
}

impl ResolverBuilder {
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
            settings: ResolverSettings::default(),
            contexts: Contexts::new(),
            default_context: Contexts::new(),
            global_context: Contexts::new(),
            decryptor: Arc::new(AesGcmDecryptor),
            env: Arc::new(ProcessEnv::default()),
            telemetry: None,
            on_update: None,
            staleness_hook: None,
        }
    }

    pub fn configs<I>(mut self, configs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RuntimeConfig>,
    {
        self.configs.extend(configs.into_iter().map(Into::into));
        self
    }

    pub fn settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn project_env_id(mut self, project_env_id: i64) -> Self {
        self.settings.project_env_id = project_env_id;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.settings.namespace = Some(namespace.into());
        self
    }

    pub fn on_no_default(mut self, on_no_default: OnNoDefault) -> Self {
        self.settings.on_no_default = on_no_default;
        self
    }

    /// Session context for this resolver
    pub fn context(mut self, contexts: Contexts) -> Self {
        self.contexts = contexts;
        self
    }

    /// Properties set on top of the session context, field by field
    pub fn default_context(mut self, contexts: Contexts) -> Self {
        self.default_context = contexts;
        self
    }

    /// Properties underneath everything else
    pub fn global_context(mut self, contexts: Contexts) -> Self {
        self.global_context = contexts;
        self
    }

    pub fn decryptor(mut self, decryptor: impl Decryptor + 'static) -> Self {
        self.decryptor = Arc::new(decryptor);
        self
    }

    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn on_update(mut self, on_update: OnUpdate) -> Self {
        self.on_update = Some(on_update);
        self
    }

    pub fn staleness_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.staleness_hook = Some(Arc::new(hook));
        self
    }

    /// Build and load the initial configs; `on_update` sees them as the
    /// first batch.
    pub fn build(self) -> Resolver {
        let mut resolver = Resolver {
            id: Uuid::new_v4(),
            configs: HashMap::new(),
            settings: self.settings,
            contexts: session_contexts(&self.global_context, &self.contexts, &self.default_context),
            default_context: self.default_context,
            global_context: self.global_context,
            decryptor: self.decryptor,
            env: self.env,
            telemetry: self.telemetry,
            on_update: self.on_update,
            staleness_hook: self.staleness_hook,
        };

        reforge_log::debug!(
            "resolver {} loading {} configs for env {}",
            resolver.id,
            self.configs.len(),
            resolver.settings.project_env_id
        );
        resolver.update(self.configs, None);
        resolver
    }
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
