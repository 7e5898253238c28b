//! Ties spawning, context construction and plugin invocation into one launch.

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use logger::Logger;
use plugin_core::{CancelSignal, ChildProcess, PluginConfig, PluginContext};
use tokio::sync::{oneshot, watch};

use crate::error::LaunchError;
use crate::plugin_invoker::invoke;
use crate::plugin_registry::PluginRegistry;
use crate::process_spawner::spawn_command;

/// What the user asked to run.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub command: String,
    pub plugin: String,
    pub config: PluginConfig,
    /// Run the command through the platform shell.
    pub shell: bool,
}

impl LaunchRequest {
    pub fn new(command: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            plugin: plugin.into(),
            config: PluginConfig::new(),
            shell: true,
        }
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LauncherSettings {
    /// How long to wait for the child after the plugin returns before handing it to a background reaper.
    pub cleanup_grace: Duration,
    /// Whether a new launch may start while another is still running.
    pub allow_overlapping: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            cleanup_grace: Duration::from_millis(100),
            allow_overlapping: true,
        }
    }
}

/// How a launch ended.
#[derive(Debug)]
pub enum LaunchOutcome {
    Completed,
    Cancelled,
    Failed(LaunchError),
}

impl LaunchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, LaunchOutcome::Completed)
    }
}

#[derive(Debug)]
pub struct LaunchReport {
    pub id: u64,
    pub plugin: String,
    pub outcome: LaunchOutcome,
    /// Exit status of the child, when it exited within the cleanup grace period.
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

/// Observable state of the launch control: how many launches are in flight.
///
/// The host UI enables its launch action again as soon as this drops back to zero.
#[derive(Clone)]
pub struct LaunchControl {
    running: Arc<watch::Sender<usize>>,
}

impl LaunchControl {
    fn new() -> Self {
        let (running, _) = watch::channel(0);
        Self { running: Arc::new(running) }
    }

    pub fn running(&self) -> usize {
        *self.running.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.running() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.running.subscribe()
    }

    /// Resolves once no launch is running.
    pub async fn wait_ready(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|running| *running == 0).await;
    }

    fn begin(&self) -> ActiveLaunch {
        self.running.send_modify(|n| *n += 1);
        ActiveLaunch { control: self.clone() }
    }
}

// Flips the control back on every exit path of a launch thread, panics included.
struct ActiveLaunch {
    control: LaunchControl,
}

impl Drop for ActiveLaunch {
    fn drop(&mut self) {
        self.control.running.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle to one running launch.
pub struct LaunchHandle {
    id: u64,
    plugin: String,
    cancel: CancelSignal,
    report: oneshot::Receiver<LaunchReport>,
}

impl LaunchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Asks the plugin to stop. The child is killed once the plugin returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub async fn wait(self) -> LaunchReport {
        let (id, plugin) = (self.id, self.plugin);
        self.report.await.unwrap_or_else(|_| lost_report(id, plugin))
    }

    /// Blocking variant of [`LaunchHandle::wait`]; must not be called from async code.
    pub fn wait_blocking(self) -> LaunchReport {
        let (id, plugin) = (self.id, self.plugin);
        self.report.blocking_recv().unwrap_or_else(|_| lost_report(id, plugin))
    }
}

fn lost_report(id: u64, plugin: String) -> LaunchReport {
    LaunchReport {
        id,
        plugin: plugin.clone(),
        outcome: LaunchOutcome::Failed(LaunchError::Runtime {
            plugin,
            reason: "launch thread ended without reporting".to_string(),
        }),
        exit_status: None,
        elapsed: Duration::ZERO,
    }
}

/// Spawns commands and runs the selected plugin next to them.
pub struct Launcher {
    registry: Arc<PluginRegistry>,
    logger: Arc<dyn Logger>,
    settings: LauncherSettings,
    control: LaunchControl,
    active: Arc<Mutex<HashMap<u64, CancelSignal>>>,
    background: Arc<Mutex<Vec<Arc<ChildProcess>>>>,
    next_id: AtomicU64,
}

impl Launcher {
    pub fn new(registry: Arc<PluginRegistry>, logger: Arc<dyn Logger>, settings: LauncherSettings) -> Self {
        Self {
            registry,
            logger,
            settings,
            control: LaunchControl::new(),
            active: Arc::new(Mutex::new(HashMap::new())),
            background: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn control(&self) -> &LaunchControl {
        &self.control
    }

    /// Ids of launches still running.
    pub fn active_launches(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Starts a launch and returns immediately.
    ///
    /// Fails fast when the request is incomplete, the plugin is unknown, or the
    /// command cannot be started and the plugin needs it. Everything after
    /// that (including plugin failures) is reported through the returned handle
    /// and the logger.
    pub fn launch(&self, request: LaunchRequest) -> Result<LaunchHandle, LaunchError> {
        let result = self.start(request);
        if let Err(e) = &result {
            self.logger.error(&format!("Launch aborted: {}", e));
        }
        result
    }

    fn start(&self, request: LaunchRequest) -> Result<LaunchHandle, LaunchError> {
        let command = request.command.trim().to_string();
        if command.is_empty() {
            return Err(LaunchError::InvalidRequest("No command given.".to_string()));
        }
        if request.plugin.trim().is_empty() {
            return Err(LaunchError::InvalidRequest("Select a plugin.".to_string()));
        }
        if !self.settings.allow_overlapping && !self.control.is_ready() {
            return Err(LaunchError::InvalidRequest("A launch is already in progress.".to_string()));
        }
        let binding = self
            .registry
            .get(request.plugin.trim())
            .ok_or_else(|| LaunchError::UnknownPlugin(request.plugin.clone()))?;

        self.logger.info(&format!("Launching: {}", command));
        let process = match spawn_command(&command, request.shell) {
            Ok(process) => {
                self.logger.debug(&format!("Started pid {}", process.pid()));
                Some(Arc::new(process))
            }
            Err(e) if binding.requires_process => return Err(e),
            Err(e) => {
                self.logger.warn(&format!("{}; running '{}' without a process", e, binding.name));
                None
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelSignal::new();
        let context = PluginContext::new(
            process.clone(),
            request.config.clone(),
            Arc::clone(&self.logger),
            cancel.clone(),
        );
        let (report_tx, report_rx) = oneshot::channel();

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, cancel.clone());
        let active_guard = self.control.begin();

        let logger = Arc::clone(&self.logger);
        let active = Arc::clone(&self.active);
        let background = Arc::clone(&self.background);
        let grace = self.settings.cleanup_grace;
        let plugin_name = binding.name.clone();
        let thread_cancel = cancel.clone();
        let thread_process = process.clone();

        let spawned = thread::Builder::new()
            .name(format!("launch-{}", id))
            .spawn(move || {
                let active_launch = active_guard;
                let started = Instant::now();
                logger.info(&format!("Starting plugin: {}", binding.name));

                let result = binding.instantiate().and_then(|instance| invoke(instance, &context));
                drop(context);

                let outcome = match result {
                    Ok(()) if thread_cancel.is_cancelled() => LaunchOutcome::Cancelled,
                    Ok(()) => LaunchOutcome::Completed,
                    Err(e) => {
                        match &e {
                            LaunchError::MissingEntryPoint { plugin } => {
                                logger.error(&format!("Plugin {} has no run entry point.", plugin))
                            }
                            other => logger.error(&format!("Plugin error: {}", other)),
                        }
                        LaunchOutcome::Failed(e)
                    }
                };

                let exit_status = match &thread_process {
                    Some(process) => finish_process(process, &thread_cancel, grace, logger.as_ref(), &background),
                    None => None,
                };

                active.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
                logger.info("Plugin finished.");
                // Ready before the waiter wakes, so it can relaunch straight away.
                drop(active_launch);

                let _ = report_tx.send(LaunchReport {
                    id,
                    plugin: binding.name.clone(),
                    outcome,
                    exit_status,
                    elapsed: started.elapsed(),
                });
            });

        if let Err(e) = spawned {
            // The closure (and with it the active guard) was dropped, so the control is ready again.
            self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            if let Some(process) = &process {
                let _ = process.kill();
            }
            return Err(LaunchError::Runtime {
                plugin: plugin_name,
                reason: format!("failed to start launch thread: {}", e),
            });
        }

        Ok(LaunchHandle {
            id,
            plugin: plugin_name,
            cancel,
            report: report_rx,
        })
    }

    /// Cancels one running launch. Returns false when no such launch is active.
    pub fn cancel(&self, id: u64) -> bool {
        match self.active.lock().unwrap_or_else(PoisonError::into_inner).get(&id) {
            Some(signal) => {
                signal.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running launch. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for signal in active.values() {
            signal.cancel();
        }
        active.len()
    }

    /// Cancels every running launch and kills children left running by finished ones.
    pub fn shutdown(&self) {
        self.cancel_all();
        for process in self.background.lock().unwrap_or_else(PoisonError::into_inner).drain(..) {
            let _ = process.kill();
        }
    }
}

/// Final cleanup of the child once the plugin has returned.
///
/// Never leaves the child stopped. Kills it when the launch was cancelled;
/// otherwise waits up to `grace` and hands a still-running child to a reaper thread.
fn finish_process(
    process: &Arc<ChildProcess>,
    cancel: &CancelSignal,
    grace: Duration,
    logger: &dyn Logger,
    background: &Arc<Mutex<Vec<Arc<ChildProcess>>>>,
) -> Option<ExitStatus> {
    let draining = process.drain_untaken_output();
    if draining > 0 {
        logger.debug(&format!("Discarding unread output of pid {}", process.pid()));
    }
    if !process.has_exited() {
        let _ = process.resume();
    }
    if cancel.is_cancelled() {
        if let Err(e) = process.kill() {
            logger.warn(&format!("Failed to kill pid {}: {}", process.pid(), e));
        }
    }

    let never = CancelSignal::new();
    match process.wait(Some(grace), &never) {
        Ok(Some(status)) => {
            logger.info(&format!("Process {} exited: {}", process.pid(), status));
            Some(status)
        }
        Ok(None) => {
            logger.info(&format!("Process {} still running; it will be reaped in the background", process.pid()));
            background
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Arc::clone(process));
            let process = Arc::clone(process);
            let background = Arc::clone(background);
            let _ = thread::Builder::new()
                .name(format!("reaper-{}", process.pid()))
                .spawn(move || {
                    let _ = process.wait(None, &never);
                    background
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|p| !Arc::ptr_eq(p, &process));
                });
            None
        }
        Err(e) => {
            logger.warn(&format!("Failed to wait for pid {}: {}", process.pid(), e));
            None
        }
    }
}
