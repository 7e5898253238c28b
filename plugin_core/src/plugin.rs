use std::fmt;
use std::io;

use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::plugin_context::PluginContext;
use crate::process::CapabilityError;
use logger::Logger;

/// Error returned by a plugin's `run`.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin requires a launched process but none is available")]
    MissingProcess,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// A plugin that receives the full [`PluginContext`] and paces or reads the child itself.
pub trait ContextPlugin: Send {
    /// Display name shown in the plugin selector.
    fn name(&self) -> &str;

    /// Whether the plugin needs a running child. Plugins that return `false`
    /// (an independent side service, for example) still run when spawning fails.
    fn requires_process(&self) -> bool {
        true
    }

    /// Runs to completion. Consumes the plugin: an instance is invoked exactly once.
    fn run(self: Box<Self>, ctx: &PluginContext) -> Result<(), PluginError>;
}

/// A plugin that only receives the host logger and manages its own behaviour.
pub trait LoggerPlugin: Send {
    fn name(&self) -> &str;

    fn run(self: Box<Self>, logger: &dyn Logger, cancel: &CancelSignal) -> Result<(), PluginError>;
}

/// The two call conventions a plugin can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConvention {
    Context,
    Logger,
}

impl fmt::Display for CallConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallConvention::Context => write!(f, "context"),
            CallConvention::Logger => write!(f, "logger"),
        }
    }
}

/// A plugin instance tagged with the call convention it declared.
pub enum PluginEntry {
    Context(Box<dyn ContextPlugin>),
    Logger(Box<dyn LoggerPlugin>),
}

impl PluginEntry {
    pub fn context<P: ContextPlugin + 'static>(plugin: P) -> Self {
        PluginEntry::Context(Box::new(plugin))
    }

    pub fn logger<P: LoggerPlugin + 'static>(plugin: P) -> Self {
        PluginEntry::Logger(Box::new(plugin))
    }

    pub fn name(&self) -> &str {
        match self {
            PluginEntry::Context(p) => p.name(),
            PluginEntry::Logger(p) => p.name(),
        }
    }

    pub fn convention(&self) -> CallConvention {
        match self {
            PluginEntry::Context(_) => CallConvention::Context,
            PluginEntry::Logger(_) => CallConvention::Logger,
        }
    }

    /// Logger-style plugins never touch the child, so they never require one.
    pub fn requires_process(&self) -> bool {
        match self {
            PluginEntry::Context(p) => p.requires_process(),
            PluginEntry::Logger(_) => false,
        }
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name())
            .field("convention", &self.convention())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl ContextPlugin for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn requires_process(&self) -> bool {
            false
        }

        fn run(self: Box<Self>, _ctx: &PluginContext) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct Chatter;

    impl LoggerPlugin for Chatter {
        fn name(&self) -> &str {
            "chatter"
        }

        fn run(self: Box<Self>, logger: &dyn Logger, _cancel: &CancelSignal) -> Result<(), PluginError> {
            logger.info("hi");
            Ok(())
        }
    }

    #[test]
    fn entries_report_their_declared_convention() {
        let ctx = PluginEntry::context(Probe);
        let log = PluginEntry::logger(Chatter);

        assert_eq!(ctx.convention(), CallConvention::Context);
        assert_eq!(log.convention(), CallConvention::Logger);
        assert_eq!(ctx.name(), "probe");
        assert_eq!(log.name(), "chatter");
        assert!(!ctx.requires_process());
        assert!(!log.requires_process());
    }

    #[test]
    fn capability_errors_convert_into_plugin_errors() {
        let err: PluginError = CapabilityError::Unsupported { operation: "pause" }.into();
        assert!(matches!(err, PluginError::Capability(_)));
        assert_eq!(err.to_string(), "pause is not supported on this platform");
    }
}
