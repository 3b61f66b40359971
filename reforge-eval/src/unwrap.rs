//! Value Unwrapper
//!
//! Turns a matched config value into a concrete [`Value`]. Precedence is
//! `decrypt_with`, then `provided`, then weighted variants, then the plain
//! payload.

use crate::error::{EvalError, Result};
use crate::evaluation::EvalHost;
use crate::hashing::{make_confidential, user_percent, variant_index};
use crate::types::{ConfigValue, Provided, ProvidedSource, RuntimeConfig, ValueKind, ValueType, WeightedValues};
use crate::value::Value;

/// Truthy spellings accepted for boolean `provided` values
pub const TRUE_VALUES: [&str; 4] = ["true", "1", "t", "yes"];

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// An unwrapped value plus what telemetry may see of it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unwrapped {
    pub value: Option<Value>,
    /// Fingerprint standing in for confidential values
    pub reportable_value: Option<String>,
    /// Which weighted variant was picked, if any
    pub weighted_value_index: Option<usize>,
}

/// Unwrap `value` for the config stored under `key`.
///
/// `hash_by_value` pins weighted variants to a context value; without it
/// the draw is random. `config` supplies the declared type for `provided`
/// values and `host` the decryption key and environment.
pub fn unwrap(
    key: &str,
    value: Option<&ConfigValue>,
    config: Option<&RuntimeConfig>,
    hash_by_value: Option<&str>,
    host: Option<&dyn EvalHost>,
) -> Result<Unwrapped> {
    let Some(value) = value else {
        return Ok(Unwrapped::default());
    };

    let mut unwrapped = unwrap_value(key, value, config, hash_by_value, host)?;

    if value.confidential || value.decrypt_with.is_some() {
        unwrapped.reportable_value = Some(make_confidential(&value.payload_string()));
    }

    Ok(unwrapped)
}

fn unwrap_value(
    key: &str,
    value: &ConfigValue,
    config: Option<&RuntimeConfig>,
    hash_by_value: Option<&str>,
    host: Option<&dyn EvalHost>,
) -> Result<Unwrapped> {
    if let Some(ref key_config) = value.decrypt_with {
        let host = host.ok_or_else(|| EvalError::MissingDecryptionKey(key_config.clone()))?;
        return decrypted(value, key_config, host).map(plain);
    }

    if let ValueKind::Provided(ref provided) = value.kind {
        let config = config.ok_or_else(|| EvalError::UnexpectedValue {
            key: key.to_string(),
            detail: "provided value outside of a config".to_string(),
        })?;
        return provided_value(config, provided, host).map(|v| Unwrapped {
            value: v,
            ..Unwrapped::default()
        });
    }

    if let ValueKind::WeightedValues(ref weighted) = value.kind {
        return unwrap_weighted(key, weighted, config, hash_by_value, host);
    }

    let value = match value.kind {
        ValueKind::String(ref s) => Value::String(s.clone()),
        ValueKind::StringList(ref list) => Value::StringList(list.values.clone()),
        ValueKind::Int(i) => Value::Int(i),
        ValueKind::Bool(b) => Value::Bool(b),
        ValueKind::Double(d) => Value::Double(d),
        ValueKind::LogLevel(level) => Value::LogLevel(level),
        ValueKind::Json(ref json) => Value::Json(serde_json::from_str(&json.json).map_err(|source| {
            EvalError::InvalidJson {
                key: key.to_string(),
                source,
            }
        })?),
        ValueKind::Duration(ref duration) => Value::Int(duration_millis(key, &duration.definition)?),
        ValueKind::IntRange(_) | ValueKind::WeightedValues(_) | ValueKind::Provided(_) => {
            return Err(EvalError::UnexpectedValue {
                key: key.to_string(),
                detail: format!("{:?}", value.kind),
            });
        }
    };

    Ok(plain(value))
}

fn plain(value: Value) -> Unwrapped {
    Unwrapped {
        value: Some(value),
        ..Unwrapped::default()
    }
}

fn decrypted(value: &ConfigValue, key_config: &str, host: &dyn EvalHost) -> Result<Value> {
    if !host.contains(key_config) {
        return Err(EvalError::MissingDecryptionKey(key_config.to_string()));
    }

    let secret = match host.resolve(key_config, None)? {
        Some(Value::String(secret)) => secret,
        Some(other) => {
            return Err(EvalError::UnexpectedValue {
                key: key_config.to_string(),
                detail: format!("decryption key must be a string, got {}", other),
            });
        }
        None => return Err(EvalError::MissingDecryptionKey(key_config.to_string())),
    };

    let payload = value.as_str().ok_or_else(|| EvalError::UnexpectedValue {
        key: key_config.to_string(),
        detail: "encrypted payload must be a string".to_string(),
    })?;

    host.decryptor().decrypt(payload, &secret).map(Value::String)
}

fn provided_value(
    config: &RuntimeConfig,
    provided: &Provided,
    host: Option<&dyn EvalHost>,
) -> Result<Option<Value>> {
    let (Some(ProvidedSource::EnvVar), Some(lookup)) = (provided.source, provided.lookup.as_deref()) else {
        return Ok(None);
    };

    let raw = host
        .and_then(|host| host.env_var(lookup))
        .ok_or_else(|| EvalError::MissingEnvVar(lookup.to_string()))?;

    coerce_into_type(config, &raw)
}

/// Read an environment string as the config's declared type.
pub fn coerce_into_type(config: &RuntimeConfig, raw: &str) -> Result<Option<Value>> {
    let invalid = |expected: &str| EvalError::InvalidProvidedValue {
        expected: expected.to_string(),
        value: raw.to_string(),
    };

    let value = match config.value_type {
        ValueType::String | ValueType::Duration => Value::String(raw.to_string()),
        ValueType::Int => Value::Int(raw.trim().parse().map_err(|_| invalid("integer"))?),
        ValueType::Double => match raw.trim().parse() {
            Ok(d) => Value::Double(d),
            Err(_) => {
                reforge_log::warn!("Expected double for provided {}, got {}", config.key, raw);
                return Ok(None);
            }
        },
        ValueType::Bool => Value::Bool(TRUE_VALUES.contains(&raw.to_lowercase().as_str())),
        ValueType::StringList => Value::StringList(split_list(raw)),
        other => {
            reforge_log::error!("Unexpected valueType {:?} for provided {}", other, config.key);
            return Ok(None);
        }
    };

    Ok(Some(value))
}

/// Split on commas, dropping only the whitespace around each comma.
fn split_list(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = raw.split(',').collect();
    let last = parts.len() - 1;

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let part = if i > 0 { part.trim_start() } else { part };
            let part = if i < last { part.trim_end() } else { part };
            part.to_string()
        })
        .collect()
}

fn unwrap_weighted(
    key: &str,
    weighted: &WeightedValues,
    config: Option<&RuntimeConfig>,
    hash_by_value: Option<&str>,
    host: Option<&dyn EvalHost>,
) -> Result<Unwrapped> {
    let weights: Vec<i32> = weighted.weighted_values.iter().map(|w| w.weight).collect();

    let position = match hash_by_value {
        Some(hash_by_value) => user_percent(key, hash_by_value)?,
        None => rand::random::<f64>(),
    };

    let Some(index) = variant_index(&weights, position) else {
        reforge_log::warn!("Unexpected value: no weighted values for {}", key);
        return Ok(Unwrapped::default());
    };

    let selected = &weighted.weighted_values[index].value;
    let nested = unwrap(key, Some(selected), config, hash_by_value, host)?;

    Ok(Unwrapped {
        weighted_value_index: Some(index),
        ..nested
    })
}

/// Milliseconds in an ISO-8601 duration. Years count 365 days and months
/// 30 days.
pub fn duration_millis(key: &str, definition: &str) -> Result<i64> {
    let duration = iso8601::duration(definition).map_err(|detail| EvalError::InvalidDuration {
        key: key.to_string(),
        detail,
    })?;

    let millis = match duration {
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => {
            (year as i64 * 365 + month as i64 * 30 + day as i64) * MILLIS_PER_DAY
                + hour as i64 * MILLIS_PER_HOUR
                + minute as i64 * MILLIS_PER_MINUTE
                + second as i64 * MILLIS_PER_SECOND
                + millisecond as i64
        }
        iso8601::Duration::Weeks(weeks) => weeks as i64 * 7 * MILLIS_PER_DAY,
    };

    Ok(millis)
}
