use std::path::PathBuf;
use std::sync::Arc;

use libloading::Library;
use plugin_core::{CallConvention, PluginEntry};

use crate::error::LaunchError;
use crate::plugin_loader;

/// Constructor exported by a plugin library as `create_plugin`.
pub type CreatePluginFn = unsafe extern "C-unwind" fn() -> *mut PluginEntry;

/// Constructor of a plugin compiled into the host.
pub type PluginFactory = Arc<dyn Fn() -> PluginEntry + Send + Sync>;

/// Where instances of a plugin come from.
#[derive(Clone)]
pub enum PluginSource {
    Builtin(PluginFactory),
    Library {
        path: PathBuf,
        library: Arc<Library>,
        /// `None` when the library does not export `create_plugin`; reported on invocation.
        create: Option<CreatePluginFn>,
    },
}

/// Represents a registered plugin and the host's binding to it.
///
/// The call convention is probed once when the binding is created. Each launch
/// asks the binding for a fresh [`PluginInstance`]; instances are never reused.
#[derive(Clone)]
pub struct PluginBinding {
    /// Display name, also the registry key.
    pub name: String,

    pub description: Option<String>,

    /// `None` only for libraries without an entry point.
    pub convention: Option<CallConvention>,

    /// Whether a launch must abort when the command fails to start.
    pub requires_process: bool,

    source: PluginSource,
}

impl PluginBinding {
    /// Binds a plugin compiled into the host. The factory is called once here to probe it.
    pub fn builtin<F>(factory: F) -> Self
    where
        F: Fn() -> PluginEntry + Send + Sync + 'static,
    {
        let probe = factory();
        Self {
            name: probe.name().to_string(),
            description: None,
            convention: Some(probe.convention()),
            requires_process: probe.requires_process(),
            source: PluginSource::Builtin(Arc::new(factory)),
        }
    }

    pub(crate) fn from_library(
        name: String,
        description: Option<String>,
        probe: Option<&PluginEntry>,
        path: PathBuf,
        library: Arc<Library>,
        create: Option<CreatePluginFn>,
    ) -> Self {
        Self {
            name,
            description,
            convention: probe.map(PluginEntry::convention),
            requires_process: probe.map(PluginEntry::requires_process).unwrap_or(true),
            source: PluginSource::Library { path, library, create },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, PluginSource::Builtin(_))
    }

    /// Library backing this binding, if it was loaded from a plugin folder.
    pub fn library(&self) -> Option<&Arc<Library>> {
        match &self.source {
            PluginSource::Library { library, .. } => Some(library),
            PluginSource::Builtin(_) => None,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match &self.source {
            PluginSource::Library { path, .. } => Some(path),
            PluginSource::Builtin(_) => None,
        }
    }

    /// Creates the instance used by exactly one launch.
    pub fn instantiate(&self) -> Result<PluginInstance, LaunchError> {
        match &self.source {
            PluginSource::Builtin(factory) => Ok(PluginInstance {
                entry: factory(),
                library: None,
            }),
            PluginSource::Library { library, create, .. } => {
                let create = create.ok_or_else(|| LaunchError::MissingEntryPoint {
                    plugin: self.name.clone(),
                })?;
                let entry = plugin_loader::call_create(create).map_err(|reason| LaunchError::Runtime {
                    plugin: self.name.clone(),
                    reason,
                })?;
                Ok(PluginInstance {
                    entry,
                    library: Some(Arc::clone(library)),
                })
            }
        }
    }
}

impl std::fmt::Debug for PluginBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginBinding")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .field("requires_process", &self.requires_process)
            .field("builtin", &self.is_builtin())
            .finish()
    }
}

/// One plugin instance, plus the library its code lives in.
///
/// The entry is declared first so it is dropped before the library handle.
pub struct PluginInstance {
    pub(crate) entry: PluginEntry,
    pub(crate) library: Option<Arc<Library>>,
}

impl PluginInstance {
    pub fn entry(&self) -> &PluginEntry {
        &self.entry
    }

    pub fn into_parts(self) -> (PluginEntry, Option<Arc<Library>>) {
        (self.entry, self.library)
    }
}

impl From<PluginEntry> for PluginInstance {
    fn from(entry: PluginEntry) -> Self {
        Self { entry, library: None }
    }
}
