use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use libloading::Library;
use logger::Logger;
use plugin_core::PluginEntry;

use crate::error::LaunchError;
use crate::plugin_binding::PluginBinding;
use crate::plugin_loader::{discover, load_plugin};

/// Outcome of rescanning a plugin folder.
#[derive(Debug, Default)]
pub struct ReloadSummary {
    pub loaded: Vec<String>,
    pub failed: Vec<(PathBuf, LaunchError)>,
}

/// Central registry of every plugin the launcher can run, keyed by display name.
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, PluginBinding>>,
    // Plugin threads may outlive the launch that started them, so replaced
    // libraries stay mapped for the life of the host.
    retired_libraries: Mutex<Vec<Arc<Library>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            retired_libraries: Mutex::new(Vec::new()),
        }
    }

    /// Registers a binding, replacing any plugin with the same name.
    pub fn register(&self, plugin: PluginBinding) {
        let mut map = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = map.insert(plugin.name.clone(), plugin) {
            self.retire(previous);
        }
    }

    /// Registers a plugin compiled into the host.
    pub fn register_builtin<F>(&self, factory: F) -> String
    where
        F: Fn() -> PluginEntry + Send + Sync + 'static,
    {
        let binding = PluginBinding::builtin(factory);
        let name = binding.name.clone();
        self.register(binding);
        name
    }

    pub fn get(&self, name: &str) -> Option<PluginBinding> {
        let map = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        map.get(name).cloned()
    }

    pub fn all(&self) -> Vec<PluginBinding> {
        let map = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Registered display names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|p| p.name).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-discovers and re-loads every plugin library in `dir`.
    ///
    /// Previously loaded library plugins are dropped from the registry first;
    /// built-ins stay. The folder is created when missing. A library that fails
    /// to load is reported and skipped, never registered.
    pub fn reload_dir(&self, dir: &Path, logger: &dyn Logger) -> ReloadSummary {
        let mut summary = ReloadSummary::default();

        {
            let mut map = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
            let stale: Vec<String> = map
                .iter()
                .filter(|(_, binding)| !binding.is_builtin())
                .map(|(name, _)| name.clone())
                .collect();
            for name in stale {
                if let Some(binding) = map.remove(&name) {
                    self.retire(binding);
                }
            }
        }

        if let Err(e) = fs::create_dir_all(dir) {
            logger.warn(&format!("Cannot create plugin folder {}: {}", dir.display(), e));
        }

        let descriptors = match discover(dir) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                logger.error(&format!("Failed to scan plugin folder {}: {}", dir.display(), e));
                return summary;
            }
        };

        for descriptor in descriptors {
            if let Some(warning) = &descriptor.manifest_warning {
                logger.warn(warning);
            }
            if self.get(&descriptor.name).is_some_and(|existing| existing.is_builtin()) {
                logger.warn(&format!(
                    "Skipping {}: a built-in plugin is already named '{}'",
                    descriptor.path.display(),
                    descriptor.name
                ));
                continue;
            }
            match load_plugin(&descriptor) {
                Ok(binding) => {
                    logger.debug(&format!(
                        "Loaded plugin '{}' from {} ({} style)",
                        binding.name,
                        descriptor.path.display(),
                        binding
                            .convention
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "no entry point".to_string())
                    ));
                    summary.loaded.push(binding.name.clone());
                    self.register(binding);
                }
                Err(e) => {
                    logger.error(&format!("Failed loading plugin {}: {}", descriptor.path.display(), e));
                    summary.failed.push((descriptor.path.clone(), e));
                }
            }
        }

        summary
    }

    fn retire(&self, binding: PluginBinding) {
        if let Some(library) = binding.library() {
            self.retired_libraries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Arc::clone(library));
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_utils;
    use logger::{LogLevel, LogWriter, MemoryLogDestination};
    use plugin_core::{CancelSignal, LoggerPlugin, PluginError};

    struct Quiet(&'static str);

    impl LoggerPlugin for Quiet {
        fn name(&self) -> &str {
            self.0
        }

        fn run(self: Box<Self>, _logger: &dyn Logger, _cancel: &CancelSignal) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn builtins_are_registered_under_their_declared_name() {
        let registry = PluginRegistry::new();
        let name = registry.register_builtin(|| PluginEntry::logger(Quiet("quiet")));

        assert_eq!(name, "quiet");
        assert_eq!(registry.names(), vec!["quiet"]);
        assert!(registry.get("quiet").unwrap().is_builtin());
        assert!(registry.get("loud").is_none());
    }

    #[test]
    fn failed_loads_are_reported_but_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(plugin_utils::resolve_plugin_filename("broken")), b"garbage").unwrap();
        let memory = Arc::new(MemoryLogDestination::new());
        let logger = LogWriter::new(LogLevel::Debug, memory.clone());

        let registry = PluginRegistry::new();
        registry.register_builtin(|| PluginEntry::logger(Quiet("quiet")));
        let summary = registry.reload_dir(dir.path(), &logger);

        assert!(summary.loaded.is_empty());
        assert_eq!(summary.failed.len(), 1);
        assert!(matches!(summary.failed[0].1, LaunchError::Load { .. }));
        assert_eq!(registry.names(), vec!["quiet"]);
        assert!(memory.contains("Failed loading plugin"));
    }

    #[test]
    fn libraries_cannot_shadow_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join(plugin_utils::resolve_plugin_filename("impostor"));
        fs::write(&library, b"garbage").unwrap();
        fs::write(library.with_extension("toml"), "name = \"quiet\"\n").unwrap();
        let memory = Arc::new(MemoryLogDestination::new());
        let logger = LogWriter::new(LogLevel::Info, memory.clone());

        let registry = PluginRegistry::new();
        registry.register_builtin(|| PluginEntry::logger(Quiet("quiet")));
        let summary = registry.reload_dir(dir.path(), &logger);

        assert!(summary.failed.is_empty());
        assert!(registry.get("quiet").unwrap().is_builtin());
        assert!(memory.contains("already named 'quiet'"));
    }

    #[test]
    fn reload_creates_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        let logger = LogWriter::new(LogLevel::Info, Arc::new(MemoryLogDestination::new()));

        let summary = PluginRegistry::new().reload_dir(&plugins, &logger);
        assert!(plugins.is_dir());
        assert!(summary.loaded.is_empty() && summary.failed.is_empty());
    }
}
