//! Request logging
//!
//! The action handler does not log through a global logger. It is given a
//! [`LogSink`] and writes through [`SafeLogger`], which redacts every line
//! before the sink sees it. Production uses [`TracingSink`]; tests hand in a
//! [`MemorySink`] and inspect what would have been logged.

use relay_core::Redactor;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Severity of a request log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for request log lines
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "relay_server::request", "{}", message),
            LogLevel::Info => info!(target: "relay_server::request", "{}", message),
            LogLevel::Warn => warn!(target: "relay_server::request", "{}", message),
            LogLevel::Error => error!(target: "relay_server::request", "{}", message),
        }
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// All messages joined, for substring assertions
    pub fn text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, message.to_string()));
    }
}

/// Redacting front for a sink
#[derive(Clone)]
pub struct SafeLogger {
    sink: Arc<dyn LogSink>,
    redactor: Arc<Redactor>,
}

impl SafeLogger {
    pub fn new(sink: Arc<dyn LogSink>, redactor: Arc<Redactor>) -> Self {
        Self { sink, redactor }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.sink.log(level, &self.redactor.redact(message));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }
}
