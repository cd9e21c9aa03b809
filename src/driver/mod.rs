/*!
 * Driver Module
 * Driver contract, registry and the in-process and remote implementations
 */

mod bridge;
mod host;
mod null;
mod registry;
pub mod remote;
mod traits;
mod types;

pub use bridge::{mac_from_ipv4, BridgeDriver, DEFAULT_BRIDGE_NAME};
pub use host::HostDriver;
pub use null::NullDriver;
pub use registry::DriverRegistry;
pub use traits::Driver;
pub use types::*;
