use std::sync::Arc;
use chrono::Utc;
use crate::log_contracts::Logger;
use crate::log_contracts::LogEntry;
use crate::log_contracts::LogDestination;
use crate::LogLevel;

pub struct LogWriter {
    threshold: LogLevel,
    destination: Arc<dyn LogDestination>,
    context: Option<String>,
}

impl LogWriter {
    pub fn new(threshold: LogLevel, destination: Arc<dyn LogDestination>) -> Self {
        Self { threshold, destination, context: None }
    }

    /// Returns a writer sharing the same destination that tags every entry with `context`.
    pub fn with_context(&self, context: impl Into<String>) -> Self {
        Self {
            threshold: self.threshold,
            destination: Arc::clone(&self.destination),
            context: Some(context.into()),
        }
    }

    fn build_entry(&self, level: LogLevel, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string(),
            message: message.to_string(),
            context: self.context.clone(),
        }
    }
}

impl Logger for LogWriter {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.threshold {
            return;
        }
        let entry = self.build_entry(level, message);
        self.destination.write_log(&entry);
    }
}
