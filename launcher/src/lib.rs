//! Host side of the slow launcher: plugin bootstrap and the interactive command set.

pub mod host_commands;
pub mod plugin_manager;

pub use host_commands::HostCommand;
pub use plugin_manager::{builtin_registry, PluginManager};
