use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::plugin_utils;

/// Optional `<stem>.toml` placed next to a plugin library.
///
/// Lets a plugin declare its display name without the host having to load
/// any of its code during discovery.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PluginManifest {
    /// Display name shown in the plugin selector.
    pub name: String,

    /// Optional description of the plugin’s purpose or function.
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginManifest {
    pub fn manifest_path(library: &Path) -> PathBuf {
        library.with_extension("toml")
    }

    /// Reads the manifest beside `library`. `Ok(None)` when there is none.
    pub fn load_beside(library: &Path) -> Result<Option<Self>, String> {
        let path = Self::manifest_path(library);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }
}

/// A plugin found during discovery. Nothing has been loaded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    /// Set when a manifest existed but could not be used.
    pub manifest_warning: Option<String>,
}

impl PluginDescriptor {
    pub fn from_library(path: PathBuf) -> Self {
        let (manifest, manifest_warning) = match PluginManifest::load_beside(&path) {
            Ok(manifest) => (manifest, None),
            Err(warning) => (None, Some(warning)),
        };
        let (name, description) = match manifest {
            Some(m) => (m.name, m.description),
            None => (plugin_utils::name_from_path(&path), None),
        };
        Self { name, path, description, manifest_warning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_name_wins_over_filename() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join(plugin_utils::resolve_plugin_filename("plugin_cpu_pacer"));
        fs::write(&lib, b"").unwrap();
        fs::write(
            PluginManifest::manifest_path(&lib),
            "name = \"cpu_pacer (suspend/resume)\"\ndescription = \"duty cycles the child\"\n",
        )
        .unwrap();

        let descriptor = PluginDescriptor::from_library(lib);
        assert_eq!(descriptor.name, "cpu_pacer (suspend/resume)");
        assert_eq!(descriptor.description.as_deref(), Some("duty cycles the child"));
        assert!(descriptor.manifest_warning.is_none());
    }

    #[test]
    fn broken_manifest_falls_back_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join(plugin_utils::resolve_plugin_filename("plugin_broken"));
        fs::write(&lib, b"").unwrap();
        fs::write(PluginManifest::manifest_path(&lib), "name = ").unwrap();

        let descriptor = PluginDescriptor::from_library(lib);
        assert_eq!(descriptor.name, "plugin_broken");
        assert!(descriptor.manifest_warning.is_some());
    }
}
