/*!
 * Option Labels
 * Well-known keys of the generic option envelope
 */

/// Nested map of driver-specific options
pub const GENERIC_DATA: &str = "ai-os.network.generic";

/// Enables IPv6 for a network
pub const ENABLE_IPV6: &str = "ai-os.network.enable_ipv6";

/// Port bindings requested at endpoint creation and reported by the driver
pub const PORT_MAP: &str = "ai-os.network.endpoint.portmap";

/// MAC address reported by the driver
pub const MAC_ADDRESS: &str = "ai-os.network.endpoint.macaddress";

/// Driver option enabling IPv4 forwarding on the host
pub const ENABLE_IP_FORWARDING: &str = "EnableIPForwarding";
