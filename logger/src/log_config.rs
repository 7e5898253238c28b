use serde::Deserialize;

/// `[logging]` section of `app_config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_type")]
    pub r#type: String, // "console" or "file"
    pub file_path: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: String, // e.g. "debug", "info"
    /// Rotation size for file logging, in megabytes.
    pub max_file_size_mb: Option<u64>,
}

fn default_log_type() -> String {
    "console".to_string()
}

fn default_threshold() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            r#type: default_log_type(),
            file_path: None,
            threshold: default_threshold(),
            max_file_size_mb: None,
        }
    }
}
