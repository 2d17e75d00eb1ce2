//! Observability sink for lifecycle handling.
//!
//! The coordinator never prints. Everything it has to say goes through a
//! [`LogSink`] injected at construction:
//! - [`TracingSink`] forwards to `tracing` with an `event` field naming the
//!   hook or tool that produced the entry (the default)
//! - [`RecordingSink`] keeps entries in memory so tests can assert on them

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

/// Severity of a sink entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for coordinator log output.
pub trait LogSink: Send + Sync {
    /// `event` is the lifecycle event or tool name the entry belongs to.
    fn log(&self, level: LogLevel, event: &str, message: &str);

    fn info(&self, event: &str, message: &str) {
        self.log(LogLevel::Info, event, message);
    }

    fn warn(&self, event: &str, message: &str) {
        self.log(LogLevel::Warn, event, message);
    }

    fn error(&self, event: &str, message: &str) {
        self.log(LogLevel::Error, event, message);
    }
}

/// Forwards entries to the global `tracing` subscriber.
///
/// ```ignore
/// sink.info("session_start", "loaded checkpoint");
/// // logs: event=session_start loaded checkpoint
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, event: &str, message: &str) {
        match level {
            LogLevel::Debug => debug!(event = %event, "{}", message),
            LogLevel::Info => info!(event = %event, "{}", message),
            LogLevel::Warn => warn!(event = %event, "{}", message),
            LogLevel::Error => error!(event = %event, "{}", message),
        }
    }
}

/// One captured sink entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub event: String,
    pub message: String,
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Entries at exactly `level`.
    pub fn at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// Whether any entry at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.at(level).iter().any(|e| e.message.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, event: &str, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                event: event.to_string(),
                message: message.to_string(),
            });
        }
    }
}
