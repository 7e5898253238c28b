use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use launcher::{builtin_registry, HostCommand, PluginManager};
use launcher::host_commands::HELP;
use launcher_core::{AppConfig, LaunchHandle, LaunchOutcome, LaunchRequest, Launcher};
use logger::{Logger, LoggerLoader};
use plugin_core::PluginConfig;

/// Runs a command and slows it down with a pacing plugin.
#[derive(Debug, Parser)]
#[command(name = "slow_launcher", version)]
struct Cli {
    /// Application configuration file.
    #[arg(long, default_value = "app_config.toml")]
    config: PathBuf,

    /// Folder scanned for plugin libraries (overrides the config file).
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Command to launch (defaults to the configured default command).
    #[arg(long)]
    command: Option<String>,

    /// Plugin to run. When given, one launch is made and the launcher exits when it finishes.
    #[arg(long)]
    plugin: Option<String>,

    /// Plugin configuration override, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// List available plugins and exit.
    #[arg(long)]
    list: bool,
}

struct Host {
    launcher: Arc<Launcher>,
    plugins: PluginManager,
    logger: Arc<dyn Logger>,
    plugin_config: PluginConfig,
    default_command: String,
    shell: bool,
}

impl Host {
    fn request(&self, plugin: &str, command: Option<String>) -> Result<LaunchRequest> {
        let plugin = self
            .plugins
            .resolve(plugin)
            .ok_or_else(|| anyhow!("unknown plugin '{}', see 'list'", plugin))?;
        let command = command.unwrap_or_else(|| self.default_command.clone());
        Ok(LaunchRequest::new(command, plugin)
            .with_config(self.plugin_config.clone())
            .with_shell(self.shell))
    }

    fn list(&self) {
        for (index, plugin) in self.plugins.plugins().iter().enumerate() {
            let source = match plugin.path() {
                Some(path) => path.display().to_string(),
                None => "built-in".to_string(),
            };
            let convention = plugin
                .convention
                .map(|c| c.to_string())
                .unwrap_or_else(|| "no entry point".to_string());
            println!("{:>3}. {}  [{}, {}]", index + 1, plugin.name, convention, source);
            if let Some(description) = &plugin.description {
                println!("     {}", description);
            }
        }
    }

    fn launch(&self, request: LaunchRequest) -> Option<LaunchHandle> {
        // Failures are already in the log; the prompt stays usable.
        self.launcher.launch(request).ok()
    }

    /// Handles one interactive command. Returns false when the loop should stop.
    fn handle(&mut self, command: HostCommand) -> bool {
        match command {
            HostCommand::List => self.list(),
            HostCommand::Reload => {
                let summary = self.plugins.reload();
                for (path, error) in &summary.failed {
                    println!("failed: {} ({})", path.display(), error);
                }
                self.list();
            }
            HostCommand::Set { key, value } => {
                let update = PluginConfig::new().with(key, value);
                self.plugin_config = self.plugin_config.merged(&update);
                println!("{}", self.plugin_config);
            }
            HostCommand::Config => {
                println!("command: {}", self.default_command);
                println!("plugin config: {}", self.plugin_config);
            }
            HostCommand::Launch { plugin, command } => match self.request(&plugin, command) {
                Ok(request) => {
                    if let Some(handle) = self.launch(request) {
                        println!("launch {} started ({})", handle.id(), handle.plugin());
                        let logger = Arc::clone(&self.logger);
                        tokio::spawn(async move {
                            let report = handle.wait().await;
                            logger.info(&format!(
                                "Launch {} ({}) ended after {:.1}s: {}",
                                report.id,
                                report.plugin,
                                report.elapsed.as_secs_f64(),
                                describe(&report.outcome)
                            ));
                        });
                    }
                }
                Err(e) => println!("{}", e),
            },
            HostCommand::Status => {
                let active = self.launcher.active_launches();
                if active.is_empty() {
                    println!("ready, nothing running");
                } else {
                    let ids: Vec<String> = active.iter().map(u64::to_string).collect();
                    println!("running: {}", ids.join(", "));
                }
            }
            HostCommand::Cancel { id: Some(id) } => {
                if !self.launcher.cancel(id) {
                    println!("no running launch {}", id);
                }
            }
            HostCommand::Cancel { id: None } => {
                let cancelled = self.launcher.cancel_all();
                println!("cancelled {} launch(es)", cancelled);
            }
            HostCommand::Help => println!("{}", HELP),
            HostCommand::Quit => return false,
        }
        true
    }
}

fn describe(outcome: &LaunchOutcome) -> String {
    match outcome {
        LaunchOutcome::Completed => "completed".to_string(),
        LaunchOutcome::Cancelled => "cancelled".to_string(),
        LaunchOutcome::Failed(e) => format!("failed ({})", e.kind()),
    }
}

async fn run_once(host: &Host, plugin: &str, command: Option<String>) -> Result<()> {
    let request = host.request(plugin, command)?;
    let handle = host.launcher.launch(request)?;
    let cancel = handle.cancel_signal();

    let wait = handle.wait();
    tokio::pin!(wait);
    let report = tokio::select! {
        report = &mut wait => report,
        _ = tokio::signal::ctrl_c() => {
            host.logger.warn("Interrupted, cancelling launch");
            cancel.cancel();
            (&mut wait).await
        }
    };

    host.launcher.control().wait_ready().await;
    match report.outcome {
        LaunchOutcome::Failed(e) => Err(e.into()),
        _ => Ok(()),
    }
}

async fn run_interactive(mut host: Host) -> Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match HostCommand::parse(&line) {
                    Ok(Some(command)) => {
                        if !host.handle(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if host.launcher.cancel_all() == 0 {
                    break;
                }
                host.logger.warn("Interrupted, cancelling running launches");
            }
        }
    }
    host.launcher.shutdown();
    host.launcher.control().wait_ready().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let logger = LoggerLoader::load(&config.logging).map_err(|e| anyhow!(e))?;
    logger.info("Logger initialized");

    let mut plugin_config = config.plugin_config.clone();
    for assignment in &cli.set {
        let (key, value) = PluginConfig::parse_assignment(assignment).map_err(|e| anyhow!(e))?;
        plugin_config = plugin_config.merged(&PluginConfig::new().with(key, value));
    }

    let registry = Arc::new(builtin_registry());
    let plugins_dir = cli.plugins_dir.clone().unwrap_or_else(|| config.launcher.plugins_dir.clone());
    let plugins = PluginManager::new(Arc::clone(&registry), plugins_dir, Arc::clone(&logger));
    plugins.reload();

    let launcher = Arc::new(Launcher::new(registry, Arc::clone(&logger), config.launcher.settings()));
    let host = Host {
        launcher,
        plugins,
        logger,
        plugin_config,
        default_command: cli.command.clone().unwrap_or_else(|| config.launcher.default_command.clone()),
        shell: config.launcher.shell,
    };

    if cli.list {
        host.list();
        return Ok(());
    }

    match cli.plugin.or(config.launcher.default_plugin.filter(|_| cli.command.is_some())) {
        Some(plugin) => run_once(&host, &plugin, cli.command).await,
        None if cli.command.is_some() => bail!("--command needs --plugin (or [launcher] default_plugin)"),
        None => run_interactive(host).await,
    }
}
