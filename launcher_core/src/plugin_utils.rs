use std::path::Path;

/// Shared-library extension for the current platform (`dll`, `dylib` or `so`).
pub fn library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Returns the filename of the plugin based on platform (e.g., libfoo.so, foo.dll, libfoo.dylib)
pub fn resolve_plugin_filename(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.{}", name, library_extension())
    } else {
        format!("lib{}.{}", name, library_extension())
    }
}

/// True when `path` carries the platform's shared-library extension.
pub fn is_plugin_library(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(library_extension()))
        .unwrap_or(false)
}

/// Display name derived from a library filename: `libplugin_cpu_pacer.so` -> `plugin_cpu_pacer`.
pub fn name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if cfg!(target_os = "windows") {
        stem
    } else {
        stem.strip_prefix("lib").map(str::to_string).unwrap_or(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn round_trips_platform_filenames() {
        let file = resolve_plugin_filename("plugin_cpu_pacer");
        let path = PathBuf::from("plugins").join(&file);
        assert!(is_plugin_library(&path));
        assert_eq!(name_from_path(&path), "plugin_cpu_pacer");
    }

    #[test]
    fn ignores_non_library_files() {
        assert!(!is_plugin_library(Path::new("plugins/readme.md")));
        assert!(!is_plugin_library(Path::new("plugins/plugin_cpu_pacer.toml")));
        assert!(!is_plugin_library(Path::new("plugins/no_extension")));
    }
}
