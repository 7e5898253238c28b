plugin_core::declare_plugin!(context => libpacing::SlowService::default);
