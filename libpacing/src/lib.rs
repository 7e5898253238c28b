//! Built-in pacing strategies.
//!
//! Each strategy is an ordinary plugin type. The launcher registers them
//! statically, and the `plugins/plugin_*` crates export the same types from
//! dynamic libraries.

pub mod cpu_pacer;
pub mod heartbeat;
pub mod output_throttle;
pub mod slow_service;

pub use cpu_pacer::{CpuPacer, DutyCycle, PacerReport, PacerState};
pub use heartbeat::Heartbeat;
pub use output_throttle::OutputThrottle;
pub use slow_service::SlowService;

use plugin_core::PluginEntry;

/// Constructors for every built-in plugin, in selector order.
pub fn builtin_plugins() -> Vec<fn() -> PluginEntry> {
    let plugins: [fn() -> PluginEntry; 4] = [
        || PluginEntry::context(CpuPacer::default()),
        || PluginEntry::context(OutputThrottle::default()),
        || PluginEntry::context(SlowService::default()),
        || PluginEntry::logger(Heartbeat::default()),
    ];
    plugins.to_vec()
}
