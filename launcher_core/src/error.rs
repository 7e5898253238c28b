use std::io;
use std::path::PathBuf;

use plugin_core::CapabilityError;
use thiserror::Error;

/// Everything that can go wrong with one launch attempt.
///
/// None of these stop the host: spawn and load failures abort the current
/// attempt, plugin failures end the current invocation.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load plugin {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("plugin '{plugin}' has no run entry point")]
    MissingEntryPoint { plugin: String },

    #[error("plugin '{plugin}' failed: {reason}")]
    Runtime { plugin: String, reason: String },

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl LaunchError {
    /// Short machine-friendly label used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            LaunchError::InvalidRequest(_) => "invalid_request",
            LaunchError::UnknownPlugin(_) => "unknown_plugin",
            LaunchError::Spawn { .. } => "spawn_error",
            LaunchError::Load { .. } => "load_error",
            LaunchError::MissingEntryPoint { .. } => "missing_entry_point",
            LaunchError::Runtime { .. } => "plugin_runtime_error",
            LaunchError::Capability(_) => "capability_unavailable",
        }
    }
}
