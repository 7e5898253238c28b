//! Contract shared by the launcher host and its plugins.
//!
//! A plugin is either *context-style* (it receives a [`PluginContext`] with the
//! launched child process, its configuration and the host logger) or
//! *logger-style* (it only receives the logger and a cancel signal). Which one
//! a plugin implements is declared explicitly through [`PluginEntry`], never
//! guessed from its signature.

pub mod cancel;
pub mod plugin;
pub mod plugin_config;
pub mod plugin_context;
pub mod plugin_macros;
pub mod process;
pub mod rate;

pub use cancel::CancelSignal;
pub use plugin::{CallConvention, ContextPlugin, LoggerPlugin, PluginEntry, PluginError};
pub use plugin_config::PluginConfig;
pub use plugin_context::PluginContext;
pub use process::{platform_process_control, CapabilityError, ChildProcess, ProcessControl, UnsupportedProcessControl};
#[cfg(unix)]
pub use process::SignalProcessControl;

pub use logger::{LogLevel, Logger};

/// Bumped whenever the layout of [`PluginEntry`] or the exported symbols change.
/// The loader refuses libraries built against a different version.
pub const PLUGIN_API_VERSION: u32 = 1;

/// Symbol exporting [`PLUGIN_API_VERSION`] from a plugin library.
pub const SYMBOL_API_VERSION: &[u8] = b"plugin_api_version";

/// Symbol constructing a boxed [`PluginEntry`] in a plugin library.
pub const SYMBOL_CREATE_PLUGIN: &[u8] = b"create_plugin";
