//! Duty-cycle pacing: the child runs for `on_ms`, then stays suspended for `off_ms`.

use std::time::{Duration, Instant};

use plugin_core::{CancelSignal, ChildProcess, ContextPlugin, Logger, PluginConfig, PluginContext, PluginError};

pub const PLUGIN_NAME: &str = "cpu_pacer (suspend/resume)";

const DEFAULT_ON_MS: u64 = 1000;
const DEFAULT_OFF_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Running,
    Suspended,
    Done,
}

/// Run and suspend phase lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub on: Duration,
    pub off: Duration,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            on: Duration::from_millis(DEFAULT_ON_MS),
            off: Duration::from_millis(DEFAULT_OFF_MS),
        }
    }
}

impl DutyCycle {
    /// Reads `on_ms` / `off_ms`. Negative or non-numeric values fall back to the defaults with a warning.
    pub fn from_config(config: &PluginConfig, logger: &dyn Logger) -> Self {
        Self {
            on: phase(config, "on_ms", DEFAULT_ON_MS, logger),
            off: phase(config, "off_ms", DEFAULT_OFF_MS, logger),
        }
    }

    /// Fraction of wall time the child is expected to spend suspended.
    pub fn off_fraction(&self) -> f64 {
        let total = self.on + self.off;
        if total.is_zero() {
            return 0.0;
        }
        self.off.as_secs_f64() / total.as_secs_f64()
    }
}

fn phase(config: &PluginConfig, key: &str, default_ms: u64, logger: &dyn Logger) -> Duration {
    let ms = match config.get(key) {
        None => default_ms,
        Some(_) => match config.get_i64(key) {
            Some(ms) if ms >= 0 => ms as u64,
            _ => {
                logger.warn(&format!("cpu_pacer: invalid {}, using {} ms", key, default_ms));
                default_ms
            }
        },
    };
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacerReport {
    /// Completed run/suspend cycles.
    pub cycles: u32,
    /// Time the child actually spent suspended.
    pub suspended: Duration,
    pub elapsed: Duration,
}

/// Periodically suspends and resumes the launched process to cut its effective CPU time.
#[derive(Debug, Default)]
pub struct CpuPacer;

impl CpuPacer {
    /// Paces `process` until it exits or `cancel` fires.
    ///
    /// The child is always resumed before this returns.
    pub fn pace(process: &ChildProcess, cycle: DutyCycle, logger: &dyn Logger, cancel: &CancelSignal) -> PacerReport {
        let started = Instant::now();
        let mut report = PacerReport::default();
        let mut guard = ResumeGuard { process, logger };
        let mut state = PacerState::Running;

        while state != PacerState::Done {
            state = match state {
                PacerState::Running => {
                    guard.resume();
                    logger.info(&format!("cpu_pacer: running for {} ms", cycle.on.as_millis()));
                    if Self::hold(process, cycle.on, cancel) {
                        PacerState::Suspended
                    } else {
                        PacerState::Done
                    }
                }
                PacerState::Suspended => {
                    let suspended = match process.pause() {
                        Ok(()) => true,
                        Err(e) => {
                            logger.warn(&format!("cpu_pacer: suspend failed: {}", e));
                            false
                        }
                    };
                    logger.info(&format!("cpu_pacer: suspended for {} ms", cycle.off.as_millis()));
                    let phase_start = Instant::now();
                    let keep_going = Self::hold(process, cycle.off, cancel);
                    if suspended {
                        report.suspended += phase_start.elapsed();
                    }
                    report.cycles += 1;
                    if keep_going {
                        PacerState::Running
                    } else {
                        PacerState::Done
                    }
                }
                PacerState::Done => PacerState::Done,
            };
        }

        drop(guard);
        report.elapsed = started.elapsed();
        report
    }

    // Waits out one phase. False when the child exited, the wait failed or the launch was cancelled.
    fn hold(process: &ChildProcess, phase: Duration, cancel: &CancelSignal) -> bool {
        match process.wait(Some(phase), cancel) {
            Ok(None) => !cancel.is_cancelled(),
            Ok(Some(_)) | Err(_) => false,
        }
    }
}

// Resumes the child on every exit path, panics included.
struct ResumeGuard<'a> {
    process: &'a ChildProcess,
    logger: &'a dyn Logger,
}

impl ResumeGuard<'_> {
    fn resume(&mut self) {
        if let Err(e) = self.process.resume() {
            if !self.process.has_exited() {
                self.logger.warn(&format!("cpu_pacer: resume failed: {}", e));
            }
        }
    }
}

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        self.resume();
    }
}

impl ContextPlugin for CpuPacer {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn run(self: Box<Self>, ctx: &PluginContext) -> Result<(), PluginError> {
        let process = ctx.require_process()?;
        let logger = ctx.logger().as_ref();
        let cycle = DutyCycle::from_config(ctx.config(), logger);

        logger.info(&format!(
            "cpu_pacer: pid={}, on={}ms off={}ms",
            process.pid(),
            cycle.on.as_millis(),
            cycle.off.as_millis()
        ));
        let report = Self::pace(process, cycle, logger, ctx.cancel());
        logger.info(&format!(
            "cpu_pacer finished. {} cycles, suspended {:.1}s of {:.1}s",
            report.cycles,
            report.suspended.as_secs_f64(),
            report.elapsed.as_secs_f64()
        ));
        Ok(())
    }
}
