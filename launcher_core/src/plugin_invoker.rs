use std::panic::{self, AssertUnwindSafe};

use plugin_core::{PluginContext, PluginEntry};

use crate::error::LaunchError;
use crate::plugin_binding::PluginInstance;
use crate::plugin_loader::panic_message;

/// Runs a plugin instance to completion according to its declared call convention.
///
/// Context-style plugins get the whole context. Logger-style plugins only get
/// its logger and cancel signal; they never see the child. Errors and panics
/// raised by plugin code come back as [`LaunchError::Runtime`].
pub fn invoke(instance: PluginInstance, context: &PluginContext) -> Result<(), LaunchError> {
    let (entry, library) = instance.into_parts();
    let plugin = entry.name().to_string();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match entry {
        PluginEntry::Context(plugin) => plugin.run(context),
        PluginEntry::Logger(plugin) => plugin.run(context.logger().as_ref(), context.cancel()),
    }));

    // The plugin value was consumed (and dropped) above, before its code can be unmapped.
    drop(library);

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(LaunchError::Runtime { plugin, reason: e.to_string() }),
        Err(payload) => Err(LaunchError::Runtime {
            plugin,
            reason: format!("panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use logger::{LogLevel, LogWriter, Logger, MemoryLogDestination};
    use plugin_core::{CancelSignal, ContextPlugin, LoggerPlugin, PluginConfig, PluginError};

    struct Greeter;

    impl LoggerPlugin for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn run(self: Box<Self>, logger: &dyn Logger, _cancel: &CancelSignal) -> Result<(), PluginError> {
            logger.info("started");
            logger.info("finished");
            Ok(())
        }
    }

    struct ConfigReader;

    impl ContextPlugin for ConfigReader {
        fn name(&self) -> &str {
            "config_reader"
        }

        fn requires_process(&self) -> bool {
            false
        }

        fn run(self: Box<Self>, ctx: &PluginContext) -> Result<(), PluginError> {
            let bps = ctx.config().get_i64("bps").ok_or_else(|| PluginError::Config("bps".into()))?;
            ctx.logger().info(&format!("bps={}", bps));
            Ok(())
        }
    }

    struct Exploder;

    impl ContextPlugin for Exploder {
        fn name(&self) -> &str {
            "exploder"
        }

        fn run(self: Box<Self>, _ctx: &PluginContext) -> Result<(), PluginError> {
            panic!("kaboom");
        }
    }

    fn context(memory: &Arc<MemoryLogDestination>, config: PluginConfig) -> PluginContext {
        let logger: Arc<dyn Logger> = Arc::new(LogWriter::new(LogLevel::Info, memory.clone()));
        PluginContext::new(None, config, logger, CancelSignal::new())
    }

    #[test]
    fn logger_style_plugins_receive_the_logger() {
        let memory = Arc::new(MemoryLogDestination::new());
        invoke(PluginEntry::logger(Greeter).into(), &context(&memory, PluginConfig::new())).unwrap();
        assert_eq!(memory.messages(), vec!["started", "finished"]);
    }

    #[test]
    fn context_style_plugins_receive_configuration() {
        let memory = Arc::new(MemoryLogDestination::new());
        let config = PluginConfig::new().with("bps", 16);
        invoke(PluginEntry::context(ConfigReader).into(), &context(&memory, config)).unwrap();
        assert_eq!(memory.messages(), vec!["bps=16"]);
    }

    #[test]
    fn plugin_errors_become_runtime_errors() {
        let memory = Arc::new(MemoryLogDestination::new());
        let err = invoke(PluginEntry::context(ConfigReader).into(), &context(&memory, PluginConfig::new()))
            .unwrap_err();
        assert!(matches!(err, LaunchError::Runtime { ref plugin, .. } if plugin == "config_reader"));
    }

    #[test]
    fn panics_are_caught_at_the_boundary() {
        let memory = Arc::new(MemoryLogDestination::new());
        let err = invoke(PluginEntry::context(Exploder).into(), &context(&memory, PluginConfig::new()))
            .unwrap_err();
        match err {
            LaunchError::Runtime { reason, .. } => assert!(reason.contains("kaboom")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
