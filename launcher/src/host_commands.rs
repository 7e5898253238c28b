//! Commands accepted by the interactive control loop.

use std::fmt;

use plugin_core::PluginConfig;
use serde_json::Value;

pub const HELP: &str = "\
Commands:
  list                       list available plugins
  reload                     rescan the plugin folder
  set <key>=<value>          set a plugin configuration value (bps, on_ms, off_ms, port, ...)
  config                     show the configuration the next launch will use
  launch <plugin> [command]  start a command paced by a plugin (name, short name or number)
  status                     show running launches
  cancel [id]                cancel one launch, or all of them
  help                       show this help
  quit                       cancel running launches and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    List,
    Reload,
    Set { key: String, value: Value },
    Config,
    Launch { plugin: String, command: Option<String> },
    Status,
    Cancel { id: Option<u64> },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

impl HostCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "list" | "ls" => HostCommand::List,
            "reload" => HostCommand::Reload,
            "config" => HostCommand::Config,
            "status" => HostCommand::Status,
            "help" | "?" => HostCommand::Help,
            "quit" | "exit" => HostCommand::Quit,
            "set" => {
                let (key, value) = PluginConfig::parse_assignment(rest).map_err(ParseError)?;
                HostCommand::Set { key, value }
            }
            "launch" | "run" => {
                let (plugin, command) = match rest.split_once(char::is_whitespace) {
                    Some((plugin, command)) => (plugin, Some(command.trim().to_string())),
                    None => (rest, None),
                };
                if plugin.is_empty() {
                    return Err(ParseError("Select a plugin.".to_string()));
                }
                HostCommand::Launch {
                    plugin: plugin.to_string(),
                    command: command.filter(|c| !c.is_empty()),
                }
            }
            "cancel" | "stop" => {
                let id = if rest.is_empty() {
                    None
                } else {
                    Some(
                        rest.parse::<u64>()
                            .map_err(|_| ParseError(format!("not a launch id: {}", rest)))?,
                    )
                };
                HostCommand::Cancel { id }
            }
            other => return Err(ParseError(format!("unknown command '{}', try 'help'", other))),
        };
        Ok(Some(command))
    }
}
