//! A library that passes the version check but exports no `create_plugin`.

#[no_mangle]
pub extern "C" fn plugin_api_version() -> u32 {
    plugin_core::PLUGIN_API_VERSION
}
