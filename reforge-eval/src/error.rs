// Error types for evaluation

use thiserror::Error;

/// Failures that abort a lookup.
///
/// Problems local to a single criterion (bad regex, unparsable semver,
/// missing segment, type mismatch) never show up here; they make that
/// criterion false and are logged instead.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Unexpected criteria {0}")]
    UnexpectedOperator(String),

    #[error("No value found for key '{0}'")]
    KeyNotFound(String),

    #[error("Key {0} not found")]
    MissingDecryptionKey(String),

    #[error("Environment variable {0} not found")]
    MissingEnvVar(String),

    #[error("Expected {expected}, got {value}")]
    InvalidProvidedValue { expected: String, value: String },

    #[error("Unexpected value for {key}: {detail}")]
    UnexpectedValue { key: String, detail: String },

    #[error("Unknown value type for {0}")]
    UnsupportedValueType(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Invalid json value for {key}: {source}")]
    InvalidJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid duration definition for {key}: {detail}")]
    InvalidDuration { key: String, detail: String },

    #[error("Hashing failed: {0}")]
    Hash(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
