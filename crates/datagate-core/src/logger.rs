//! Injected logging collaborator
//!
//! Facades never log through a global; each instance holds the `Logger`
//! it was constructed with. Logger methods cannot fail, so a log call can
//! never mask the error that follows it.

use parking_lot::Mutex;
use std::sync::Arc;

/// Sink for facade log lines
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards every line to `tracing` under the `datagate` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "datagate", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "datagate", "{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "datagate", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "datagate", "{}", message);
    }
}

/// The logger used when a caller does not inject one
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Keeps every line in memory; used by tests to assert on log output
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Lines at one level, in order
    pub fn at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, line)| line.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.push(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
