use std::sync::Mutex;
use std::time::Instant;
use crate::log_contracts::LogDestination;
use crate::log_contracts::LogEntry;

/// A log entry kept in memory together with the moment it was written.
#[derive(Debug, Clone)]
pub struct CapturedEntry {
    pub entry: LogEntry,
    pub at: Instant,
}

/// Keeps every entry in memory.
///
/// Used by embedders that render their own log view, and by tests that assert
/// on message order and spacing.
#[derive(Default)]
pub struct MemoryLogDestination {
    entries: Mutex<Vec<CapturedEntry>>,
}

impl MemoryLogDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<CapturedEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages in the order they were written.
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|c| c.entry.message).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|c| c.entry.message.contains(needle))
    }
}

impl LogDestination for MemoryLogDestination {
    fn write_log(&self, entry: &LogEntry) {
        let captured = CapturedEntry { entry: entry.clone(), at: Instant::now() };
        match self.entries.lock() {
            Ok(mut guard) => guard.push(captured),
            Err(poisoned) => poisoned.into_inner().push(captured),
        }
    }
}
