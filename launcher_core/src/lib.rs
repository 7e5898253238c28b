pub mod app_config;
pub use app_config::{AppConfig, ConfigError, LauncherConfig};

pub mod error;
pub use error::LaunchError;

pub mod process_spawner;
pub use process_spawner::spawn_command;

pub mod plugin_utils;
pub mod plugin_metadata;
pub use plugin_metadata::{PluginDescriptor, PluginManifest};

pub mod plugin_binding;
pub use plugin_binding::{PluginBinding, PluginInstance};

pub mod plugin_loader;
pub use plugin_loader::{discover, load_plugin};

pub mod plugin_registry;
pub use plugin_registry::{PluginRegistry, ReloadSummary};

pub mod plugin_invoker;
pub use plugin_invoker::invoke;

pub mod launch_orchestrator;
pub use launch_orchestrator::{
    LaunchControl, LaunchHandle, LaunchOutcome, LaunchReport, LaunchRequest, Launcher, LauncherSettings,
};
