/// Exports a plugin from a `cdylib` so the launcher can load it from a plugin folder.
///
/// The call convention is declared explicitly:
///
/// ```ignore
/// plugin_core::declare_plugin!(context => libpacing::CpuPacer::default);
/// plugin_core::declare_plugin!(logger => libpacing::Heartbeat::default);
/// ```
///
/// Expands to two symbols: `plugin_api_version`, checked by the loader before
/// anything else, and `create_plugin`, which returns a freshly boxed
/// [`PluginEntry`](crate::PluginEntry). The loader calls `create_plugin` once per launch.
#[macro_export]
macro_rules! declare_plugin {
    (context => $constructor:path) => {
        $crate::declare_plugin!(@export $crate::PluginEntry::Context(Box::new($constructor())));
    };
    (logger => $constructor:path) => {
        $crate::declare_plugin!(@export $crate::PluginEntry::Logger(Box::new($constructor())));
    };
    (@export $entry:expr) => {
        #[no_mangle]
        pub extern "C" fn plugin_api_version() -> u32 {
            $crate::PLUGIN_API_VERSION
        }

        // The entry holds Rust trait objects; host and plugin must be built with
        // the same toolchain and plugin_core, which PLUGIN_API_VERSION stands for.
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn create_plugin() -> *mut $crate::PluginEntry {
            let entry: $crate::PluginEntry = $entry;
            Box::into_raw(Box::new(entry))
        }
    };
}
