use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use plugin_core::{PluginEntry, PLUGIN_API_VERSION, SYMBOL_API_VERSION, SYMBOL_CREATE_PLUGIN};

use crate::error::LaunchError;
use crate::plugin_binding::{CreatePluginFn, PluginBinding};
use crate::plugin_metadata::PluginDescriptor;
use crate::plugin_utils;

/// Lists the plugin libraries directly inside `dir`, sorted by display name.
///
/// Only enumerates: no plugin code is loaded. A missing directory yields an empty list.
pub fn discover<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PluginDescriptor>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && plugin_utils::is_plugin_library(&path) {
            found.push(PluginDescriptor::from_library(path));
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Loads a plugin library and returns its binding.
///
/// The library must export `plugin_api_version` matching this host. Its
/// `create_plugin` constructor is called once here to learn the call
/// convention; a constructor that panics or returns null fails the load. A
/// library without `create_plugin` still loads, and fails when invoked.
pub fn load_plugin(descriptor: &PluginDescriptor) -> Result<PluginBinding, LaunchError> {
    let load_error = |reason: String| LaunchError::Load {
        path: descriptor.path.clone(),
        reason,
    };

    // SAFETY: loading a library runs its initialisers. Plugins are trusted code.
    let library = unsafe { Library::new(&descriptor.path) }
        .map_err(|e| load_error(format!("Failed to load plugin: {}", e)))?;

    let version = unsafe {
        let symbol: Symbol<extern "C" fn() -> u32> = library
            .get(SYMBOL_API_VERSION)
            .map_err(|e| load_error(format!("Not a launcher plugin, missing symbol: {}", e)))?;
        symbol()
    };
    if version != PLUGIN_API_VERSION {
        return Err(load_error(format!(
            "Plugin API version {} does not match host version {}",
            version, PLUGIN_API_VERSION
        )));
    }

    let create: Option<CreatePluginFn> = unsafe {
        library
            .get::<CreatePluginFn>(SYMBOL_CREATE_PLUGIN)
            .ok()
            .map(|symbol| *symbol)
    };

    let probe = match create {
        Some(create) => Some(call_create(create).map_err(load_error)?),
        None => None,
    };

    Ok(PluginBinding::from_library(
        descriptor.name.clone(),
        descriptor.description.clone(),
        probe.as_ref(),
        descriptor.path.clone(),
        Arc::new(library),
        create,
    ))
}

/// Calls a library's `create_plugin`, turning panics and null pointers into errors.
pub(crate) fn call_create(create: CreatePluginFn) -> Result<PluginEntry, String> {
    // SAFETY: `create` comes from a library that reported our PLUGIN_API_VERSION.
    let raw = panic::catch_unwind(AssertUnwindSafe(|| unsafe { create() }))
        .map_err(|payload| format!("create_plugin panicked: {}", panic_message(payload.as_ref())))?;
    if raw.is_null() {
        return Err("create_plugin returned a null pointer".to_string());
    }
    // SAFETY: non-null pointers come from `Box::into_raw` in `declare_plugin!`.
    let entry = unsafe { Box::from_raw(raw) };
    Ok(*entry)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_is_non_recursive_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(plugin_utils::resolve_plugin_filename("beta")), b"").unwrap();
        fs::write(dir.path().join(plugin_utils::resolve_plugin_filename("alpha")), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a plugin").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join(plugin_utils::resolve_plugin_filename("gamma")), b"").unwrap();

        let names: Vec<_> = discover(dir.path()).unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn missing_directory_discovers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn garbage_library_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(plugin_utils::resolve_plugin_filename("garbage"));
        fs::write(&path, b"this is not machine code").unwrap();

        let descriptor = PluginDescriptor::from_library(path);
        let err = load_plugin(&descriptor).unwrap_err();
        assert!(matches!(err, LaunchError::Load { .. }));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
