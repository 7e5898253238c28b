//! Plugin Manager Module
//!
//! Owns the registry for the lifetime of the host: built-ins are registered
//! once, plugin-folder libraries are (re)loaded on demand, and user input is
//! resolved to a registered plugin name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use launcher_core::{PluginBinding, PluginRegistry, ReloadSummary};
use logger::Logger;

/// A registry holding every plugin compiled into the launcher.
pub fn builtin_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    for create in libpacing::builtin_plugins() {
        registry.register_builtin(create);
    }
    registry
}

pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    plugins_dir: PathBuf,
    logger: Arc<dyn Logger>,
}

impl PluginManager {
    pub fn new(registry: Arc<PluginRegistry>, plugins_dir: impl Into<PathBuf>, logger: Arc<dyn Logger>) -> Self {
        Self {
            registry,
            plugins_dir: plugins_dir.into(),
            logger,
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Rescans the plugin folder.
    pub fn reload(&self) -> ReloadSummary {
        let summary = self.registry.reload_dir(&self.plugins_dir, self.logger.as_ref());
        self.logger.info(&format!(
            "{} plugins available ({} loaded from {}, {} failed)",
            self.registry.len(),
            summary.loaded.len(),
            self.plugins_dir.display(),
            summary.failed.len()
        ));
        summary
    }

    /// Plugins in selector order.
    pub fn plugins(&self) -> Vec<PluginBinding> {
        self.registry.all()
    }

    /// Resolves what the user typed to a registered name.
    ///
    /// Accepts the full display name, a 1-based index into [`PluginManager::plugins`],
    /// or the short name before the first space when it is unambiguous
    /// (`cpu_pacer` for `cpu_pacer (suspend/resume)`).
    pub fn resolve(&self, input: &str) -> Option<String> {
        resolve_name(input, &self.registry.names())
    }
}

pub(crate) fn resolve_name(input: &str, names: &[String]) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(exact) = names.iter().find(|n| n.as_str() == input) {
        return Some(exact.clone());
    }
    if let Ok(index) = input.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| names.get(i)).cloned();
    }
    let mut short = names.iter().filter(|n| short_name(n) == input);
    match (short.next(), short.next()) {
        (Some(name), None) => Some(name.clone()),
        _ => None,
    }
}

fn short_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logger::{LogLevel, LogWriter, MemoryLogDestination};

    fn names() -> Vec<String> {
        builtin_registry().names()
    }

    #[test]
    fn builtins_are_all_registered() {
        let names = names();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"cpu_pacer (suspend/resume)".to_string()));
        assert!(names.contains(&"heartbeat (logger only)".to_string()));
    }

    #[test]
    fn resolves_full_short_and_indexed_names() {
        let names = names();
        assert_eq!(resolve_name("stdout_bps", &names).as_deref(), Some("stdout_bps (throttle STDOUT/ERR)"));
        assert_eq!(
            resolve_name("live_stream (slow HTTP server)", &names).as_deref(),
            Some("live_stream (slow HTTP server)")
        );
        assert_eq!(resolve_name("1", &names), Some(names[0].clone()));
        assert_eq!(resolve_name("0", &names), None);
        assert_eq!(resolve_name("99", &names), None);
        assert_eq!(resolve_name("nothing", &names), None);
    }

    #[test]
    fn ambiguous_short_names_do_not_resolve() {
        let names = vec!["dup (a)".to_string(), "dup (b)".to_string()];
        assert_eq!(resolve_name("dup", &names), None);
    }

    #[test]
    fn reload_keeps_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryLogDestination::new());
        let logger: Arc<dyn Logger> = Arc::new(LogWriter::new(LogLevel::Info, memory.clone()));
        let manager = PluginManager::new(Arc::new(builtin_registry()), dir.path().join("plugins"), logger);

        let summary = manager.reload();

        assert!(summary.loaded.is_empty());
        assert_eq!(manager.plugins().len(), 4);
        assert!(memory.contains("4 plugins available"));
    }
}
