plugin_core::declare_plugin!(context => libpacing::CpuPacer::default);
