/*!
 * Driver Traits
 * Contract every network driver implements
 */

use super::types::{InterfaceInfo, JoinInfo};
use crate::core::errors::NetworkResult;
use crate::core::types::Options;

/// A network driver, in-process or reached over a plugin endpoint
///
/// Calls for one network arrive serialised by the core; drivers must still
/// tolerate concurrent calls for different networks and endpoints.
pub trait Driver: Send + Sync {
    /// Type name the driver is registered under
    fn driver_type(&self) -> &str;

    /// Apply driver-wide options
    fn config(&self, options: &Options) -> NetworkResult<()>;

    fn create_network(&self, network_id: &str, options: &Options) -> NetworkResult<()>;

    fn delete_network(&self, network_id: &str) -> NetworkResult<()>;

    /// Allocate the interfaces of a new endpoint
    fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        options: &Options,
    ) -> NetworkResult<Vec<InterfaceInfo>>;

    /// Operational data such as port mappings and MAC address
    fn endpoint_oper_info(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<Options>;

    fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()>;

    /// Attach an endpoint to the sandbox at `sandbox_key`
    fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        options: &Options,
    ) -> NetworkResult<JoinInfo>;

    fn leave(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()>;
}
