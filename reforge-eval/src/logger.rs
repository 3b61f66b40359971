//! Log-Level Resolvers
//!
//! Two lookups decide whether a logger should emit:
//!
//! - [`Resolver::should_log`] walks `log-level.<logger name>` up its dotted
//!   path and uses the closest configured ancestor.
//! - [`Resolver::get_log_level`] asks a single config, matching the logger
//!   name exactly through the `reforge-sdk-logging.logger-path` property.

use crate::context::Contexts;
use crate::resolver::{DefaultValue, Resolver};
use crate::types::LogLevel;
use reforge_config::OnNoDefault;
use reforge_log::Level;

/// Prefix of per-logger config keys for [`Resolver::should_log`]
pub const LOG_LEVEL_PREFIX: &str = "log-level.";

/// Context type carried by [`Resolver::get_log_level`] lookups
pub const LOGGING_CONTEXT_TYPE: &str = "reforge-sdk-logging";

/// Property holding the logger name in [`LOGGING_CONTEXT_TYPE`]
pub const LOGGER_PATH_PROPERTY: &str = "logger-path";

impl Resolver {
    /// Whether a message at `desired_level` from `logger_name` passes the
    /// configured threshold.
    ///
    /// An unparsable `desired_level` logs a warning and answers `true`.
    /// When no ancestor of the logger is configured, `default_level` is
    /// used, then the resolver's `default_log_level` setting.
    pub fn should_log(
        &self,
        logger_name: &str,
        desired_level: &str,
        default_level: Option<LogLevel>,
        contexts: Option<&Contexts>,
    ) -> bool {
        let desired: LogLevel = match desired_level.parse() {
            Ok(level) => level,
            Err(_) => {
                reforge_log::warn!(
                    "Invalid desired level `{}` provided to should_log for {}. Returning `true`",
                    desired_level,
                    logger_name
                );
                return true;
            }
        };

        if self.settings().collect_logger_counts {
            if let Some(telemetry) = self.telemetry() {
                telemetry.record_logger(logger_name, desired);
            }
        }

        let mut key = format!("{}{}", LOG_LEVEL_PREFIX, logger_name);

        while key.contains('.') {
            match self.get_with(&key, contexts, DefaultValue::NotProvided, Some(OnNoDefault::Ignore)) {
                Ok(Some(value)) => match value.as_log_level() {
                    Some(resolved) => return resolved.rank() <= desired.rank(),
                    None => reforge_log::warn!("Ignoring {}: {} is not a log level", key, value),
                },
                Ok(None) => {}
                Err(e) => reforge_log::warn!("Failed to resolve {}: {}", key, e),
            }

            match key.rfind('.') {
                Some(idx) => key.truncate(idx),
                None => break,
            }
        }

        self.default_log_level(default_level).rank() <= desired.rank()
    }

    fn default_log_level(&self, default_level: Option<LogLevel>) -> LogLevel {
        default_level
            .or_else(|| self.settings().default_log_level.parse().ok())
            .unwrap_or(LogLevel::Warn)
    }

    /// Configured level for `logger_name` from the `logger_key` config.
    ///
    /// No path traversal: only rules matching the exact logger name (or an
    /// unconditional fallback) apply. Anything missing or invalid is
    /// [`LogLevel::Debug`].
    pub fn get_log_level(&self, logger_name: &str) -> LogLevel {
        let Some(key) = self.settings().logger_key.as_deref() else {
            return LogLevel::Debug;
        };

        let contexts = Contexts::new().with(LOGGING_CONTEXT_TYPE, LOGGER_PATH_PROPERTY, logger_name);

        match self.get_with(
            key,
            Some(&contexts),
            DefaultValue::value(LogLevel::Debug),
            Some(OnNoDefault::Ignore),
        ) {
            Ok(Some(value)) => value.as_log_level().unwrap_or(LogLevel::Debug),
            Ok(None) => LogLevel::Debug,
            Err(e) => {
                reforge_log::warn!("Failed to resolve log level for {}: {}", logger_name, e);
                LogLevel::Debug
            }
        }
    }

    /// A named logger filtered by [`should_log`](Self::should_log)
    pub fn logger(
        &self,
        name: impl Into<String>,
        default_level: Option<LogLevel>,
        contexts: Option<Contexts>,
    ) -> Logger<'_> {
        Logger {
            resolver: self,
            name: name.into(),
            default_level,
            contexts,
        }
    }
}

/// Logger whose threshold lives in config
pub struct Logger<'a> {
    resolver: &'a Resolver,
    name: String,
    default_level: Option<LogLevel>,
    contexts: Option<Contexts>,
}

impl Logger<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit `message` if `level` passes; returns the written line.
    pub fn log(&self, level: LogLevel, message: &str) -> Option<String> {
        if !self
            .resolver
            .should_log(&self.name, level.as_str(), self.default_level, self.contexts.as_ref())
        {
            return None;
        }

        let body = format!("{}: {}", self.name, message);
        reforge_log::emit(sink_level(level), &self.name, &body);
        Some(format!("{:<5} {}", level.as_str(), body))
    }

    pub fn trace(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> Option<String> {
        self.log(LogLevel::Fatal, message)
    }
}

fn sink_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::Trace,
        LogLevel::Debug => Level::Debug,
        LogLevel::Info => Level::Info,
        LogLevel::Warn => Level::Warn,
        LogLevel::Error | LogLevel::Fatal => Level::Error,
    }
}
