plugin_core::declare_plugin!(logger => libpacing::Heartbeat::default);
