//! Config Data Model
//!
//! Wire types for configs, rows, conditional values and criteria. Field
//! names and enum tokens are shared with every other Reforge SDK and must
//! not drift.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Kind of config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigType {
    #[default]
    Config,
    FeatureFlag,
    LogLevel,
    Segment,
    LimitDefinition,
    Deleted,
    Schema,
}

/// Declared type of a config's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int,
    String,
    Bytes,
    Double,
    Bool,
    LimitDefinition,
    LogLevel,
    StringList,
    IntRange,
    Duration,
    Json,
}

/// Log level as stored in log-level configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Position in trace < debug < info < warn < error < fatal.
    pub fn rank(&self) -> u8 {
        match self {
            LogLevel::Trace => 0,
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
            LogLevel::Fatal => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the upper-case wire tokens and their lower-case method names.
impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TRACE" | "trace" => Ok(LogLevel::Trace),
            "DEBUG" | "debug" => Ok(LogLevel::Debug),
            "INFO" | "info" => Ok(LogLevel::Info),
            "WARN" | "warn" => Ok(LogLevel::Warn),
            "ERROR" | "error" => Ok(LogLevel::Error),
            "FATAL" | "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!("invalid log level `{}`", other)),
        }
    }
}

/// Where a `provided` value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvidedSource {
    EnvVar,
}

/// Criterion operator. The set is closed; anything else received over the
/// wire lands in `Unknown` and fails evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    LookupKeyIn,
    LookupKeyNotIn,
    InSeg,
    NotInSeg,
    AlwaysTrue,
    PropIsOneOf,
    PropIsNotOneOf,
    PropEndsWithOneOf,
    PropDoesNotEndWithOneOf,
    HierarchicalMatch,
    InIntRange,
    PropStartsWithOneOf,
    PropDoesNotStartWithOneOf,
    PropContainsOneOf,
    PropDoesNotContainOneOf,
    PropLessThan,
    PropLessThanOrEqual,
    PropGreaterThan,
    PropGreaterThanOrEqual,
    PropBefore,
    PropAfter,
    PropMatches,
    PropDoesNotMatch,
    PropSemverLessThan,
    PropSemverEqual,
    PropSemverGreaterThan,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringList {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Integer range; both bounds are inclusive when evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsoDuration {
    /// e.g. `PT1H30S`
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonValue {
    pub json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provided {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProvidedSource>,
    /// e.g. `MY_ENV_VAR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedValue {
    pub weight: i32,
    pub value: ConfigValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedValues {
    pub weighted_values: Vec<WeightedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_by_property_name: Option<String>,
}

/// The payload of a [`ConfigValue`]; exactly one per value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int(i64),
    String(String),
    Double(f64),
    Bool(bool),
    StringList(StringList),
    LogLevel(LogLevel),
    IntRange(IntRange),
    Duration(IsoDuration),
    Json(JsonValue),
    WeightedValues(WeightedValues),
    Provided(Provided),
}

/// A configured value: payload plus the confidentiality flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    #[serde(flatten)]
    pub kind: ValueKind,
    /// Don't log or report this value
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub confidential: bool,
    /// Key of the config holding the decryption key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypt_with: Option<String>,
}

impl ConfigValue {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            confidential: false,
            decrypt_with: None,
        }
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn double(value: f64) -> Self {
        Self::new(ValueKind::Double(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn string_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ValueKind::StringList(StringList {
            values: values.into_iter().map(Into::into).collect(),
        }))
    }

    pub fn log_level(level: LogLevel) -> Self {
        Self::new(ValueKind::LogLevel(level))
    }

    pub fn int_range(start: Option<i64>, end: Option<i64>) -> Self {
        Self::new(ValueKind::IntRange(IntRange { start, end }))
    }

    pub fn duration(definition: impl Into<String>) -> Self {
        Self::new(ValueKind::Duration(IsoDuration {
            definition: definition.into(),
        }))
    }

    pub fn json(json: impl Into<String>) -> Self {
        Self::new(ValueKind::Json(JsonValue { json: json.into() }))
    }

    pub fn weighted(weighted_values: Vec<WeightedValue>, hash_by_property_name: Option<&str>) -> Self {
        Self::new(ValueKind::WeightedValues(WeightedValues {
            weighted_values,
            hash_by_property_name: hash_by_property_name.map(str::to_string),
        }))
    }

    pub fn env_var(lookup: impl Into<String>) -> Self {
        Self::new(ValueKind::Provided(Provided {
            source: Some(ProvidedSource::EnvVar),
            lookup: Some(lookup.into()),
        }))
    }

    /// Mark as confidential
    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    /// Mark as encrypted with the key stored under `key_config`
    pub fn decrypt_with(mut self, key_config: impl Into<String>) -> Self {
        self.decrypt_with = Some(key_config.into());
        self
    }

    /// The string payload, if this is a `string` value.
    pub fn as_str(&self) -> Option<&str> {
        match self.kind {
            ValueKind::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// Declared type implied by the payload, for values set at runtime.
    /// Weighted, provided and duration payloads carry no standalone type.
    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            ValueKind::String(_) => Some(ValueType::String),
            ValueKind::Int(_) => Some(ValueType::Int),
            ValueKind::Double(_) => Some(ValueType::Double),
            ValueKind::Bool(_) => Some(ValueType::Bool),
            ValueKind::StringList(_) => Some(ValueType::StringList),
            ValueKind::LogLevel(_) => Some(ValueType::LogLevel),
            ValueKind::IntRange(_) => Some(ValueType::IntRange),
            ValueKind::Json(_) => Some(ValueType::Json),
            ValueKind::Duration(_) | ValueKind::WeightedValues(_) | ValueKind::Provided(_) => None,
        }
    }

    /// The payload rendered as the raw, still-encoded string that
    /// confidential fingerprints are computed over.
    pub fn payload_string(&self) -> String {
        match self.kind {
            ValueKind::String(ref s) => s.clone(),
            ValueKind::Int(i) => i.to_string(),
            ValueKind::Double(d) => d.to_string(),
            ValueKind::Bool(b) => b.to_string(),
            ValueKind::StringList(ref list) => list.values.join(","),
            ValueKind::LogLevel(level) => level.as_str().to_string(),
            ValueKind::Duration(ref d) => d.definition.clone(),
            ValueKind::Json(ref j) => j.json.clone(),
            ValueKind::IntRange(_) | ValueKind::WeightedValues(_) | ValueKind::Provided(_) => {
                serde_json::to_string(&self.kind).unwrap_or_default()
            }
        }
    }
}

/// One test against the context (or a fixed parameter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub property_name: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_to_match: Option<ConfigValue>,
}

impl Criterion {
    pub fn new(property_name: impl Into<String>, operator: Operator, value_to_match: ConfigValue) -> Self {
        Self {
            property_name: property_name.into(),
            operator,
            value_to_match: Some(value_to_match),
        }
    }
}

/// If all criteria match, the value is selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalValue {
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConfigValue>,
}

impl ConditionalValue {
    /// A value with no criteria, i.e. the fallback branch
    pub fn always(value: ConfigValue) -> Self {
        Self {
            criteria: Vec::new(),
            value: Some(value),
        }
    }

    pub fn when(criteria: Vec<Criterion>, value: ConfigValue) -> Self {
        Self {
            criteria,
            value: Some(value),
        }
    }
}

/// Rows are environment scoped; a row without a matching environment is a
/// fallback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_env_id: Option<i64>,
    #[serde(default)]
    pub properties: HashMap<String, ConfigValue>,
    #[serde(default)]
    pub values: Vec<ConditionalValue>,
}

impl ConfigRow {
    pub fn new(values: Vec<ConditionalValue>) -> Self {
        Self {
            project_env_id: None,
            properties: HashMap::new(),
            values,
        }
    }

    pub fn for_env(project_env_id: i64, values: Vec<ConditionalValue>) -> Self {
        Self {
            project_env_id: Some(project_env_id),
            ..Self::new(values)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedBy {
    pub user_id: String,
    pub email: String,
    pub api_key_id: String,
}

/// A config as delivered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub id: String,
    pub project_id: i64,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<ChangedBy>,
    #[serde(default)]
    pub rows: Vec<ConfigRow>,
    #[serde(default)]
    pub allowable_values: Vec<ConfigValue>,
    pub config_type: ConfigType,
    pub value_type: ValueType,
    #[serde(default)]
    pub send_to_client_sdk: bool,
}

/// A config as held by a resolver. Entries synthesized by `set()` have no
/// id, project or author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<ChangedBy>,
    #[serde(default)]
    pub rows: Vec<ConfigRow>,
    #[serde(default)]
    pub allowable_values: Vec<ConfigValue>,
    pub config_type: ConfigType,
    pub value_type: ValueType,
    #[serde(default)]
    pub send_to_client_sdk: bool,
}

impl RuntimeConfig {
    /// Start a config that answers `value` unconditionally
    pub fn builder(key: impl Into<String>) -> RuntimeConfigBuilder {
        RuntimeConfigBuilder {
            key: key.into(),
            id: None,
            config_type: ConfigType::Config,
            rows: Vec::new(),
        }
    }

    /// Deleted configs and configs without rows are removed on update
    pub fn is_tombstone(&self) -> bool {
        self.config_type == ConfigType::Deleted || self.rows.is_empty()
    }
}

impl From<Config> for RuntimeConfig {
    fn from(config: Config) -> Self {
        Self {
            id: Some(config.id),
            project_id: Some(config.project_id),
            key: config.key,
            changed_by: config.changed_by,
            rows: config.rows,
            allowable_values: config.allowable_values,
            config_type: config.config_type,
            value_type: config.value_type,
            send_to_client_sdk: config.send_to_client_sdk,
        }
    }
}

/// Builder for runtime configs.
///
/// Unset fields get the sentinels `set()` uses: no id/project/author, no
/// allowable values, `CONFIG` type, not sent to client SDKs.
#[derive(Debug, Clone)]
pub struct RuntimeConfigBuilder {
    key: String,
    id: Option<String>,
    config_type: ConfigType,
    rows: Vec<ConfigRow>,
}

impl RuntimeConfigBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn config_type(mut self, config_type: ConfigType) -> Self {
        self.config_type = config_type;
        self
    }

    pub fn row(mut self, row: ConfigRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Build a single-row config answering `value` unconditionally; the
    /// value type is derived from the payload.
    pub fn value(self, value: ConfigValue) -> Result<RuntimeConfig> {
        let value_type = value
            .value_type()
            .ok_or_else(|| EvalError::UnsupportedValueType(format!("{:?}", value.kind)))?;

        Ok(self
            .row(ConfigRow::new(vec![ConditionalValue::always(value)]))
            .build(value_type))
    }

    /// Build with the rows added so far
    pub fn build(self, value_type: ValueType) -> RuntimeConfig {
        RuntimeConfig {
            id: self.id,
            project_id: None,
            key: self.key,
            changed_by: None,
            rows: self.rows,
            allowable_values: Vec::new(),
            config_type: self.config_type,
            value_type,
            send_to_client_sdk: false,
        }
    }
}
