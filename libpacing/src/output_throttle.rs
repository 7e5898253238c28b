//! Re-emits the child's stdout and stderr one byte at a time at a configured bit rate.
//!
//! Only what the launcher shows is slowed down; the child itself runs at full speed
//! until its pipes fill up.

use std::io::{self, Read};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use plugin_core::rate::{byte_delay, DEFAULT_BPS};
use plugin_core::{CancelSignal, ContextPlugin, Logger, PluginConfig, PluginContext, PluginError};

pub const PLUGIN_NAME: &str = "stdout_bps (throttle STDOUT/ERR)";

const DEFAULT_DRAIN_GRACE_MS: u64 = 100;

#[derive(Debug, Default)]
pub struct OutputThrottle;

impl OutputThrottle {
    /// Per-byte delay for the configured `bps`. Non-positive rates are clamped with a warning.
    pub fn delay_for(config: &PluginConfig, logger: &dyn Logger) -> Duration {
        let bps = config.get_i64("bps").unwrap_or(DEFAULT_BPS);
        if bps <= 0 {
            logger.warn(&format!("stdout_bps: bps must be positive (got {}), using 1", bps));
        }
        byte_delay(bps)
    }
}

/// Copies `reader` to the logger one byte per line, tagged `[tag]`, sleeping `delay` after each byte.
///
/// Returns the number of bytes forwarded. Stops early when `cancel` fires.
pub fn pace_stream<R: Read>(
    mut reader: R,
    tag: &str,
    delay: Duration,
    logger: &dyn Logger,
    cancel: &CancelSignal,
) -> io::Result<u64> {
    let mut forwarded = 0;
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                // Bytes that are not valid UTF-8 on their own are dropped from the line.
                let text = std::str::from_utf8(&byte).unwrap_or("");
                logger.info(&format!("[{}] {}", tag, text));
                forwarded += 1;
                if !cancel.sleep(delay) {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(forwarded)
}

fn spawn_reader<R>(
    reader: R,
    tag: &'static str,
    delay: Duration,
    logger: Arc<dyn Logger>,
    cancel: CancelSignal,
    done: mpsc::Sender<()>,
) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("stdout_bps-{}", tag.to_lowercase()))
        .spawn(move || {
            if let Err(e) = pace_stream(reader, tag, delay, logger.as_ref(), &cancel) {
                logger.warn(&format!("stdout_bps: {} reader failed: {}", tag, e));
            }
            let _ = done.send(());
        })?;
    Ok(())
}

impl ContextPlugin for OutputThrottle {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn run(self: Box<Self>, ctx: &PluginContext) -> Result<(), PluginError> {
        let process = ctx.require_process()?;
        let logger = ctx.logger();
        let delay = Self::delay_for(ctx.config(), logger.as_ref());
        let drain_grace = Duration::from_millis(ctx.config().get_u64("drain_grace_ms").unwrap_or(DEFAULT_DRAIN_GRACE_MS));

        let (done_tx, done_rx) = mpsc::channel();
        let mut readers = 0;
        if let Some(stdout) = process.take_stdout() {
            spawn_reader(stdout, "OUT", delay, Arc::clone(logger), ctx.cancel().clone(), done_tx.clone())?;
            readers += 1;
        }
        if let Some(stderr) = process.take_stderr() {
            spawn_reader(stderr, "ERR", delay, Arc::clone(logger), ctx.cancel().clone(), done_tx.clone())?;
            readers += 1;
        }
        drop(done_tx);

        process.wait(None, ctx.cancel())?;

        // Readers still pacing a backlog after the grace period keep running detached.
        let deadline = Instant::now() + drain_grace;
        for _ in 0..readers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if done_rx.recv_timeout(remaining).is_err() {
                logger.debug("stdout_bps: output still draining after the child exited");
                break;
            }
        }
        Ok(())
    }
}
