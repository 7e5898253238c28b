use std::time::Duration;

use plugin_core::{CancelSignal, Logger, LoggerPlugin, PluginError};

pub const PLUGIN_NAME: &str = "heartbeat (logger only)";

/// Logger-style demo plugin: logs `started`, a few ticks, then `finished`.
///
/// It never sees the child or the configuration.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub ticks: u32,
    pub interval: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ticks: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl LoggerPlugin for Heartbeat {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn run(self: Box<Self>, logger: &dyn Logger, cancel: &CancelSignal) -> Result<(), PluginError> {
        logger.info("started");
        for tick in 1..=self.ticks {
            if !cancel.sleep(self.interval) {
                logger.info("cancelled");
                break;
            }
            logger.info(&format!("tick {}", tick));
        }
        logger.info("finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logger::{LogLevel, LogWriter, MemoryLogDestination};
    use std::sync::Arc;

    #[test]
    fn logs_started_ticks_and_finished_in_order() {
        let memory = Arc::new(MemoryLogDestination::new());
        let logger = LogWriter::new(LogLevel::Info, memory.clone());
        let plugin = Box::new(Heartbeat {
            ticks: 2,
            interval: Duration::from_millis(5),
        });

        plugin.run(&logger, &CancelSignal::new()).unwrap();

        assert_eq!(memory.messages(), vec!["started", "tick 1", "tick 2", "finished"]);
    }

    #[test]
    fn cancelled_heartbeat_still_finishes() {
        let memory = Arc::new(MemoryLogDestination::new());
        let logger = LogWriter::new(LogLevel::Info, memory.clone());
        let cancel = CancelSignal::new();
        cancel.cancel();

        Box::new(Heartbeat::default()).run(&logger, &cancel).unwrap();

        assert_eq!(memory.messages(), vec!["started", "cancelled", "finished"]);
    }
}
