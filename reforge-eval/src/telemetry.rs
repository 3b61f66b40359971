//! Telemetry seam
//!
//! The resolver reports what it saw here; batching and upload belong to
//! the host.

use crate::context::Contexts;
use crate::evaluation::Evaluation;
use crate::types::LogLevel;
use parking_lot::Mutex;

/// Receives lookups as they happen. Every method defaults to doing nothing.
pub trait Telemetry: Send + Sync {
    /// Effective context of a lookup against a backend-delivered config
    fn record_context(&self, _contexts: &Contexts) {}

    /// Outcome of a lookup against a backend-delivered config
    fn record_evaluation(&self, _evaluation: &Evaluation) {}

    /// A logger asked whether to log at `level`
    fn record_logger(&self, _logger_name: &str, _level: LogLevel) {}
}

/// Keeps everything in memory until drained
#[derive(Default)]
pub struct TelemetryRecorder {
    contexts: Mutex<Vec<Contexts>>,
    evaluations: Mutex<Vec<Evaluation>>,
    loggers: Mutex<Vec<(String, LogLevel)>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain_contexts(&self) -> Vec<Contexts> {
        std::mem::take(&mut *self.contexts.lock())
    }

    pub fn drain_evaluations(&self) -> Vec<Evaluation> {
        std::mem::take(&mut *self.evaluations.lock())
    }

    pub fn drain_loggers(&self) -> Vec<(String, LogLevel)> {
        std::mem::take(&mut *self.loggers.lock())
    }
}

impl Telemetry for TelemetryRecorder {
    fn record_context(&self, contexts: &Contexts) {
        self.contexts.lock().push(contexts.clone());
    }

    fn record_evaluation(&self, evaluation: &Evaluation) {
        self.evaluations.lock().push(evaluation.clone());
    }

    fn record_logger(&self, logger_name: &str, level: LogLevel) {
        self.loggers.lock().push((logger_name.to_string(), level));
    }
}
