use std::io::{self, Write};
use crate::log_contracts::LogDestination;
use crate::log_contracts::LogEntry;

/// Writes `timestamp [LEVEL] message` lines to stdout.
pub struct ConsoleLogDestination;

impl ConsoleLogDestination {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleLogDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDestination for ConsoleLogDestination {
    fn write_log(&self, entry: &LogEntry) {
        let line = match &entry.context {
            Some(ctx) => format!("{} [{}] {} | {}\n", entry.timestamp, entry.level, entry.message, ctx),
            None => format!("{} [{}] {}\n", entry.timestamp, entry.level, entry.message),
        };
        // Holding the stdout lock for the whole line keeps concurrent writers from splicing.
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(line.as_bytes());
        let _ = handle.flush();
    }
}
