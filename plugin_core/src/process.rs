//! Child process handle and the suspend/resume capability plugins use to pace it.

use std::io;
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::CancelSignal;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A pause/resume primitive was unavailable or failed.
///
/// Never fatal: callers log it as a warning and carry on.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[error("{operation} failed for pid {pid}: {reason}")]
    Unavailable {
        operation: &'static str,
        pid: u32,
        reason: String,
    },
}

/// Platform capability to stop and continue a process by identifier.
pub trait ProcessControl: Send + Sync {
    fn pause(&self, pid: u32) -> Result<(), CapabilityError>;
    fn resume(&self, pid: u32) -> Result<(), CapabilityError>;

    /// Forcefully terminates everything the capability controls for `pid`.
    fn terminate(&self, _pid: u32) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported { operation: "terminate" })
    }
}

/// Fallback for platforms without a suspend primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProcessControl;

impl ProcessControl for UnsupportedProcessControl {
    fn pause(&self, _pid: u32) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported { operation: "pause" })
    }

    fn resume(&self, _pid: u32) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported { operation: "resume" })
    }
}

/// `SIGSTOP` / `SIGCONT` based control.
///
/// When the child was spawned as the leader of its own process group the whole
/// group is signalled, so commands run through a shell pause together with the shell.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProcessControl {
    process_group: bool,
}

#[cfg(unix)]
impl SignalProcessControl {
    pub fn process() -> Self {
        Self { process_group: false }
    }

    pub fn process_group() -> Self {
        Self { process_group: true }
    }

    fn signal(&self, operation: &'static str, pid: u32, signal: libc::c_int) -> Result<(), CapabilityError> {
        let raw = libc::pid_t::try_from(pid).map_err(|_| CapabilityError::Unavailable {
            operation,
            pid,
            reason: "pid out of range".to_string(),
        })?;
        let target = if self.process_group { -raw } else { raw };
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(target, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(CapabilityError::Unavailable {
                operation,
                pid,
                reason: io::Error::last_os_error().to_string(),
            })
        }
    }
}

#[cfg(unix)]
impl ProcessControl for SignalProcessControl {
    fn pause(&self, pid: u32) -> Result<(), CapabilityError> {
        self.signal("pause", pid, libc::SIGSTOP)
    }

    fn resume(&self, pid: u32) -> Result<(), CapabilityError> {
        self.signal("resume", pid, libc::SIGCONT)
    }

    fn terminate(&self, pid: u32) -> Result<(), CapabilityError> {
        self.signal("terminate", pid, libc::SIGKILL)
    }
}

/// Best control available on the current platform.
pub fn platform_process_control(process_group: bool) -> Arc<dyn ProcessControl> {
    #[cfg(unix)]
    {
        if process_group {
            Arc::new(SignalProcessControl::process_group())
        } else {
            Arc::new(SignalProcessControl::process())
        }
    }
    #[cfg(not(unix))]
    {
        let _ = process_group;
        Arc::new(UnsupportedProcessControl)
    }
}

/// Handle to the launched child, shared between the host and the active plugin.
///
/// The host owns its lifecycle; plugins may pause, resume, read or wait on it.
pub struct ChildProcess {
    pid: u32,
    child: Mutex<Child>,
    stdout: Mutex<Option<ChildStdout>>,
    stderr: Mutex<Option<ChildStderr>>,
    control: Arc<dyn ProcessControl>,
}

impl ChildProcess {
    pub fn new(mut child: Child, control: Arc<dyn ProcessControl>) -> Self {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        Self {
            pid: child.id(),
            child: Mutex::new(child),
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
            control,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking exit check.
    pub fn try_status(&self) -> io::Result<Option<ExitStatus>> {
        lock(&self.child).try_wait()
    }

    /// True once the child has exited, or when its status can no longer be queried.
    pub fn has_exited(&self) -> bool {
        !matches!(self.try_status(), Ok(None))
    }

    /// Waits for the child to exit.
    ///
    /// Returns `Ok(None)` when `timeout` elapsed or `cancel` fired first.
    pub fn wait(&self, timeout: Option<Duration>, cancel: &CancelSignal) -> io::Result<Option<ExitStatus>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(status) = self.try_status()? {
                return Ok(Some(status));
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    WAIT_POLL_INTERVAL.min(deadline - now)
                }
                None => WAIT_POLL_INTERVAL,
            };
            if !cancel.sleep(pause) {
                return Ok(None);
            }
        }
    }

    /// Takes the captured standard output. Only the first caller gets it.
    pub fn take_stdout(&self) -> Option<ChildStdout> {
        lock(&self.stdout).take()
    }

    /// Takes the captured standard error. Only the first caller gets it.
    pub fn take_stderr(&self) -> Option<ChildStderr> {
        lock(&self.stderr).take()
    }

    /// Discards whatever output nobody took, on background threads, so the child
    /// never blocks on a full pipe. Returns how many streams are being drained.
    pub fn drain_untaken_output(&self) -> usize {
        let mut draining = 0;
        if let Some(stdout) = self.take_stdout() {
            draining += usize::from(spawn_drain(stdout, self.pid, "stdout"));
        }
        if let Some(stderr) = self.take_stderr() {
            draining += usize::from(spawn_drain(stderr, self.pid, "stderr"));
        }
        draining
    }

    pub fn pause(&self) -> Result<(), CapabilityError> {
        self.ensure_alive("pause")?;
        self.control.pause(self.pid)
    }

    pub fn resume(&self) -> Result<(), CapabilityError> {
        self.ensure_alive("resume")?;
        self.control.resume(self.pid)
    }

    /// Kills the child (and its process group where the platform allows it).
    pub fn kill(&self) -> io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        let _ = self.control.terminate(self.pid);
        let mut child = lock(&self.child);
        match child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }

    // Once reaped, the pid may already belong to an unrelated process.
    fn ensure_alive(&self, operation: &'static str) -> Result<(), CapabilityError> {
        if self.has_exited() {
            return Err(CapabilityError::Unavailable {
                operation,
                pid: self.pid,
                reason: "process already exited".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcess").field("pid", &self.pid).finish()
    }
}

fn spawn_drain<R: io::Read + Send + 'static>(mut pipe: R, pid: u32, stream: &str) -> bool {
    std::thread::Builder::new()
        .name(format!("drain-{}-{}", pid, stream))
        .spawn(move || {
            let _ = io::copy(&mut pipe, &mut io::sink());
        })
        .is_ok()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Read;
    use std::process::{Command, Stdio};

    fn spawn(script: &str, control: Arc<dyn ProcessControl>) -> ChildProcess {
        let child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        ChildProcess::new(child, control)
    }

    #[test]
    fn captures_output_and_reports_exit() {
        let process = spawn("printf hello; printf oops >&2", Arc::new(UnsupportedProcessControl));
        let status = process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();
        assert!(status.unwrap().success());

        let mut out = String::new();
        process.take_stdout().unwrap().read_to_string(&mut out).unwrap();
        let mut err = String::new();
        process.take_stderr().unwrap().read_to_string(&mut err).unwrap();
        assert_eq!(out, "hello");
        assert_eq!(err, "oops");
        assert!(process.take_stdout().is_none());
    }

    #[test]
    fn chatty_child_finishes_once_untaken_output_is_drained() {
        let process = spawn("head -c 1048576 /dev/zero; echo done", Arc::new(UnsupportedProcessControl));
        // Nobody reads: the child is stuck on a full pipe.
        let blocked = process.wait(Some(Duration::from_millis(300)), &CancelSignal::new()).unwrap();
        assert!(blocked.is_none());

        assert_eq!(process.drain_untaken_output(), 2);
        let status = process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();
        assert!(status.unwrap().success());
        assert_eq!(process.drain_untaken_output(), 0);
    }

    #[test]
    fn wait_times_out_while_child_runs() {
        let process = spawn("sleep 5", Arc::new(SignalProcessControl::process()));
        let status = process.wait(Some(Duration::from_millis(50)), &CancelSignal::new()).unwrap();
        assert!(status.is_none());
        assert!(!process.has_exited());
        process.kill().unwrap();
        assert!(process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap().is_some());
    }

    #[test]
    fn unsupported_control_reports_capability_error() {
        let process = spawn("sleep 1", Arc::new(UnsupportedProcessControl));
        assert!(matches!(process.pause(), Err(CapabilityError::Unsupported { .. })));
        process.kill().unwrap();
    }

    #[test]
    fn pausing_an_exited_child_is_refused() {
        let process = spawn("true", Arc::new(SignalProcessControl::process()));
        process.wait(None, &CancelSignal::new()).unwrap();
        assert!(matches!(process.pause(), Err(CapabilityError::Unavailable { .. })));
        assert!(process.resume().is_err());
    }

    #[test]
    fn stopped_child_makes_no_progress_until_resumed() {
        let process = spawn("sleep 0.2", Arc::new(SignalProcessControl::process()));
        process.pause().unwrap();
        // Stopped for longer than its own runtime: it must still be alive.
        std::thread::sleep(Duration::from_millis(400));
        assert!(!process.has_exited());
        process.resume().unwrap();
        let status = process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();
        assert!(status.is_some());
    }
}
