// Reforge - client-side feature flag and dynamic config evaluation
//
// This library evaluates Reforge configs locally: environment-scoped rows,
// targeting criteria, percentage rollouts, encrypted values and
// config-driven log levels.

// Re-export the evaluation engine
pub use reforge_eval::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use reforge_config;

#[cfg(feature = "log")]
pub use reforge_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ConditionalValue,
        ConfigChangeNotifier,
        ConfigRow,
        ConfigType,
        ConfigValue,
        Contexts,
        Criterion,
        DefaultValue,
        EvalError,
        Evaluation,
        LogLevel,
        Logger,
        OnNoDefault,
        Operator,
        Resolver,
        ResolverSettings,
        RuntimeConfig,
        Value,
        ValueType,
    };

    #[cfg(feature = "config")]
    pub use reforge_config::{FileFormat, SettingsService};
}
