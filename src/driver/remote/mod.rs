/*!
 * Remote Drivers
 * Out-of-process drivers reached through plugin spec files
 */

mod api;
mod client;
mod discovery;
mod driver;

pub use api::{NETWORK_DRIVER_ENDPOINT, PLUGIN_CONTENT_TYPE};
pub use client::PluginClient;
pub use discovery::{PluginDiscovery, PluginSpec};
pub use driver::RemoteDriver;
