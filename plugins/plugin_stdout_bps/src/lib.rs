plugin_core::declare_plugin!(context => libpacing::OutputThrottle::default);
