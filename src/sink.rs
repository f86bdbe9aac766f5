//! Log sink for rewrite and validation warnings
//!
//! The engine never logs through ambient global state for messages an
//! operator must act on; a sink is handed to whoever emits them.

use std::fmt;
use std::sync::Mutex;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Receives `(severity, message)` pairs
pub trait LogSink {
    fn log(&self, severity: Severity, message: &str);
}

/// Forwards to `tracing` at the matching level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "router_schema", "{}", message),
            Severity::Info => tracing::info!(target: "router_schema", "{}", message),
            Severity::Warning => tracing::warn!(target: "router_schema", "{}", message),
            Severity::Error => tracing::error!(target: "router_schema", "{}", message),
        }
    }
}

/// Keeps every message in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(Severity, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(s, _)| *s == Severity::Warning)
            .map(|(_, m)| m)
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, severity: Severity, message: &str) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((severity, message.to_string()));
    }
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message)
    }
}
