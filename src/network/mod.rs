/*!
 * Network Module
 * Networks and their endpoints
 */

mod endpoint;
#[allow(clippy::module_inception)]
mod network;

pub use endpoint::{Endpoint, EndpointInfo, EndpointOptions};
pub use network::Network;
pub(crate) use network::NetworkInner;
