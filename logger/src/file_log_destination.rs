use std::fs::{OpenOptions, rename};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use serde_json;
use crate::log_contracts::LogDestination;
use crate::log_contracts::LogEntry;

/// Appends JSON lines to a file, rotating it to `*.log.bak` past `max_size` bytes.
pub struct FileLogDestination {
    file: Mutex<std::fs::File>,
    path: PathBuf,
    max_size: u64,
}

impl FileLogDestination {
    pub fn new(path: PathBuf, max_size: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            max_size,
        })
    }

    // Caller holds the file lock for the whole rotate-then-write sequence.
    fn rotate_if_needed(&self, file: &mut std::fs::File) {
        let Ok(metadata) = file.metadata() else {
            return;
        };
        if metadata.len() <= self.max_size {
            return;
        }
        let _ = rename(&self.path, self.path.with_extension("log.bak"));
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(new_file) => *file = new_file,
            Err(e) => eprintln!("Failed to reopen log file {}: {}", self.path.display(), e),
        }
    }
}

impl LogDestination for FileLogDestination {
    fn write_log(&self, entry: &LogEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Failed to serialize log entry: {}", e);
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.rotate_if_needed(&mut file);
        let _ = writeln!(file, "{}", json);
    }
}
