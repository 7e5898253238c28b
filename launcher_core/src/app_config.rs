use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logger::LoggingConfig;
use plugin_core::PluginConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::launch_orchestrator::LauncherSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contents of `app_config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    /// Default configuration handed to every plugin, before command-line overrides.
    #[serde(default = "default_plugin_config")]
    pub plugin_config: PluginConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            launcher: LauncherConfig::default(),
            plugin_config: default_plugin_config(),
        }
    }
}

impl AppConfig {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The logger is built from this file, so this warning cannot go through it.
                eprintln!("{} not found, using default configuration", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        // Keep the bps default even when the section only names other keys.
        if config.plugin_config.get("bps").is_none() {
            config.plugin_config = default_plugin_config().merged(&config.plugin_config);
        }
        Ok(config)
    }
}

/// `[launcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub default_command: String,
    pub plugins_dir: PathBuf,
    pub shell: bool,
    pub default_plugin: Option<String>,
    pub cleanup_grace_ms: u64,
    pub allow_overlapping: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            default_command: default_command().to_string(),
            plugins_dir: PathBuf::from("plugins"),
            shell: true,
            default_plugin: None,
            cleanup_grace_ms: 100,
            allow_overlapping: true,
        }
    }
}

impl LauncherConfig {
    pub fn settings(&self) -> LauncherSettings {
        LauncherSettings {
            cleanup_grace: Duration::from_millis(self.cleanup_grace_ms),
            allow_overlapping: self.allow_overlapping,
        }
    }
}

#[cfg(windows)]
fn default_command() -> &'static str {
    "ping 127.0.0.1 -n 10"
}

#[cfg(not(windows))]
fn default_command() -> &'static str {
    "echo Hello && sleep 1 && echo World"
}

fn default_plugin_config() -> PluginConfig {
    PluginConfig::new().with("bps", 1)
}
