//! Reforge Evaluation Engine
//!
//! Client-side evaluation of Reforge feature flags and dynamic configs:
//! rows scoped by environment, criteria matched against a caller context,
//! percentage rollouts, provided and encrypted values, and log levels
//! driven by config.
//!
//! # Features
//!
//! - 🎯 **Criteria** - String, numeric, date, regex, semver and segment rules
//! - 🎲 **Rollouts** - Weighted values hashed on a context property
//! - 🔐 **Secrets** - AES-GCM encrypted values with masked reporting
//! - 📜 **Log Levels** - Hierarchical and exact-match logger thresholds
//! - 🔔 **Change Notification** - Listeners fired when config ids advance
//!
//! # Quick Start
//!
//! ```
//! use reforge_eval::*;
//!
//! let mut resolver = Resolver::builder().project_env_id(5).build();
//! resolver.set("checkout.v2", ConfigValue::bool(true)).unwrap();
//!
//! assert!(resolver.is_feature_enabled("checkout.v2", None));
//! ```
//!
//! # Targeting
//!
//! ```
//! use reforge_eval::*;
//!
//! let config = RuntimeConfig::builder("beta.banner")
//!     .row(ConfigRow::new(vec![
//!         ConditionalValue::when(
//!             vec![Criterion::new(
//!                 "user.email",
//!                 Operator::PropEndsWithOneOf,
//!                 ConfigValue::string_list(["@example.com"]),
//!             )],
//!             ConfigValue::string("staff"),
//!         ),
//!         ConditionalValue::always(ConfigValue::string("everyone")),
//!     ]))
//!     .build(ValueType::String);
//!
//! let resolver = Resolver::builder().configs([config]).build();
//! let staff = Contexts::new().with("user", "email", "jo@example.com");
//!
//! assert_eq!(
//!     resolver.get("beta.banner", Some(&staff)).unwrap(),
//!     Some(Value::from("staff"))
//! );
//! ```
//!
//! # Change Notification
//!
//! ```
//! use reforge_eval::*;
//!
//! let notifier = ConfigChangeNotifier::new();
//! let mut resolver = Resolver::builder().on_update(notifier.hook()).build();
//! notifier.init(&resolver);
//!
//! notifier.add_listener(|| println!("configs changed"));
//! resolver.update(
//!     [RuntimeConfig::builder("a").id("42").value(ConfigValue::int(1)).unwrap()],
//!     None,
//! );
//! assert_eq!(notifier.last_total_id(), "42");
//! ```

pub mod context;
pub mod criteria;
pub mod encryption;
pub mod env;
pub mod error;
pub mod evaluation;
pub mod hashing;
pub mod logger;
pub mod notifier;
pub mod resolver;
pub mod rows;
pub mod telemetry;
pub mod types;
pub mod unwrap;
pub mod value;

pub use context::{merge_default, merge_local, ContextProperties, ContextValue, Contexts, CURRENT_TIME_PROPERTY};
pub use encryption::{decrypt, encrypt, generate_new_hex_key, AesGcmDecryptor, Decryptor};
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{EvalError, Result};
pub use evaluation::{evaluate, EvalHost, Evaluation, Scope, NO_MATCH};
pub use hashing::{make_confidential, stable_hash32};
pub use logger::{Logger, LOG_LEVEL_PREFIX};
pub use notifier::{total_id, ConfigChangeNotifier, ConfigSource, ListenerId, TotalId};
pub use resolver::{DefaultValue, OnUpdate, Resolver, ResolverBuilder, StalenessHook};
pub use telemetry::{Telemetry, TelemetryRecorder};
pub use types::{
    ChangedBy, ConditionalValue, Config, ConfigRow, ConfigType, ConfigValue, Criterion, LogLevel, Operator,
    RuntimeConfig, RuntimeConfigBuilder, ValueKind, ValueType, WeightedValue,
};
pub use unwrap::Unwrapped;
pub use value::Value;

pub use reforge_config::{OnNoDefault, ResolverSettings};
