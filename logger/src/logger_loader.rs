use std::sync::Arc;
use crate::log_contracts::Logger;
use crate::log_contracts::LogLevel;
use crate::log_contracts::LogDestination;
use crate::log_config::LoggingConfig;
use crate::console_log_destination::ConsoleLogDestination;
use crate::file_log_destination::FileLogDestination;
use crate::LogWriter;

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LoggerLoader;

impl LoggerLoader {
    pub fn load(config: &LoggingConfig) -> Result<Arc<dyn Logger>, String> {
        Ok(Arc::new(Self::load_writer(config)?))
    }

    /// Like [`LoggerLoader::load`], but keeps the concrete writer so callers can derive
    /// context-tagged writers from it.
    pub fn load_writer(config: &LoggingConfig) -> Result<LogWriter, String> {
        let threshold = config.threshold.trim().parse::<LogLevel>()?;

        let log_dest: Arc<dyn LogDestination> = match config.r#type.to_lowercase().as_str() {
            "console" => Arc::new(ConsoleLogDestination::new()),
            "file" => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| "Missing file_path for file logging".to_string())?;
                let max_size = config
                    .max_file_size_mb
                    .map(|mb| mb * 1024 * 1024)
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE);
                Arc::new(
                    FileLogDestination::new(path.into(), max_size)
                        .map_err(|e| format!("Failed to open log file '{}': {}", path, e))?,
                )
            }
            other => return Err(format!("Unknown logger type '{}'", other)),
        };

        Ok(LogWriter::new(threshold, log_dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_destination() {
        let config = LoggingConfig { r#type: "http".into(), ..LoggingConfig::default() };
        assert!(LoggerLoader::load(&config).is_err());
    }

    #[test]
    fn rejects_unknown_threshold() {
        let config = LoggingConfig { threshold: "verbose".into(), ..LoggingConfig::default() };
        let err = LoggerLoader::load(&config).unwrap_err();
        assert!(err.contains("Unknown log level 'verbose'"));
    }

    #[test]
    fn threshold_is_case_insensitive() {
        let config = LoggingConfig { threshold: "WARN".into(), ..LoggingConfig::default() };
        assert!(LoggerLoader::load(&config).is_ok());
    }

    #[test]
    fn file_destination_requires_path() {
        let config = LoggingConfig { r#type: "file".into(), ..LoggingConfig::default() };
        let err = LoggerLoader::load(&config).unwrap_err();
        assert!(err.contains("file_path"));
    }

    #[test]
    fn file_logger_writes_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.log");
        let config = LoggingConfig {
            r#type: "file".into(),
            file_path: Some(path.to_string_lossy().into_owned()),
            threshold: "debug".into(),
            max_file_size_mb: None,
        };

        let logger = LoggerLoader::load(&config).unwrap();
        logger.debug("Plugin finished.");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Plugin finished."));
    }
}
