/*!
 * Driver Types
 * Interface descriptions exchanged between drivers and the core
 */

use ipnetwork::{Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Built-in driver type names
pub const BRIDGE: &str = "bridge";
pub const HOST: &str = "host";
pub const NULL: &str = "null";

/// Addressing of one endpoint interface as decided by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Position of the interface within the endpoint
    pub id: usize,
    pub address: Option<Ipv4Network>,
    pub address_v6: Option<Ipv6Network>,
    pub mac_address: Option<String>,
}

/// Device the sandbox moves into its namespace during a join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceName {
    /// Device name outside the namespace
    pub src_name: String,
    /// Prefix of the name inside the namespace
    pub dst_prefix: String,
}

/// Result of a driver join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinInfo {
    /// One entry per interface returned from endpoint creation, in order
    pub interface_names: Vec<InterfaceName>,
    pub gateway: Option<Ipv4Addr>,
    pub gateway_v6: Option<Ipv6Addr>,
}
