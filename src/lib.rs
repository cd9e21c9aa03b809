/*!
 * AI-OS Network Library
 * Container network core: sandboxes, networks, endpoints and pluggable drivers
 */

pub mod controller;
pub mod core;
pub mod driver;
pub mod monitoring;
pub mod namespace;
pub mod network;
pub mod sandbox;
pub mod store;

// Re-exports
pub use controller::Controller;
pub use crate::core::config::{ControllerConfig, NamespaceMode};
pub use crate::core::errors::{NetworkError, NetworkResult};
pub use crate::core::labels;
pub use crate::core::types::{generic_options, Options, PortBinding, Protocol};
pub use driver::{Driver, InterfaceInfo, JoinInfo};
pub use monitoring::{init_tracing, try_init_tracing};
pub use network::{Endpoint, EndpointInfo, EndpointOptions, Network};
pub use sandbox::{Sandbox, SandboxHandle, SandboxOptions};
pub use store::{DataStore, MemoryStore};
