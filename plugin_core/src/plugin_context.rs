use std::sync::Arc;

use crate::cancel::CancelSignal;
use crate::plugin::PluginError;
use crate::plugin_config::PluginConfig;
use crate::process::ChildProcess;
use logger::Logger;

/// Runtime context handed from the host to a context-style plugin.
///
/// Built once per launch, after the child (if any) has been started and before
/// any plugin code runs. Plugins only get shared access; the host never mutates
/// it after handing it over.
pub struct PluginContext {
    process: Option<Arc<ChildProcess>>,
    config: PluginConfig,
    logger: Arc<dyn Logger>,
    cancel: CancelSignal,
}

impl PluginContext {
    pub fn new(
        process: Option<Arc<ChildProcess>>,
        config: PluginConfig,
        logger: Arc<dyn Logger>,
        cancel: CancelSignal,
    ) -> Self {
        Self { process, config, logger, cancel }
    }

    /// The launched child, absent when spawning failed or the plugin does not need one.
    pub fn process(&self) -> Option<&Arc<ChildProcess>> {
        self.process.as_ref()
    }

    pub fn require_process(&self) -> Result<&Arc<ChildProcess>, PluginError> {
        self.process.as_ref().ok_or(PluginError::MissingProcess)
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// The only channel through which a plugin may surface output.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("process", &self.process)
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish()
    }
}
