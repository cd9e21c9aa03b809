/*!
 * Bridge Driver
 * In-process driver deciding subnets, addresses and host port mappings
 *
 * The driver keeps the bookkeeping a bridge network needs (address pools,
 * port reservations, join information) without programming bridge devices or
 * firewall rules.
 */

use super::traits::Driver;
use super::types::{InterfaceInfo, InterfaceName, JoinInfo, BRIDGE};
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::labels;
use crate::core::types::{option_flag, port_bindings, Options, PortBinding, Protocol};
use ipnetwork::{Ipv4Network, Ipv6Network};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bridge used when a network does not name one
pub const DEFAULT_BRIDGE_NAME: &str = "aios0";

const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";
const EPHEMERAL_PORTS: RangeInclusive<u16> = 49153..=65535;
const CONTAINER_IF_PREFIX: &str = "eth";
const VETH_PREFIX: &str = "veth";
/// Widest IPv6 subnet a bridge accepts
const MIN_IPV6_PREFIX: u8 = 64;

/// Driver-wide options
#[derive(Debug, Default)]
struct DriverConfiguration {
    enable_ip_forwarding: bool,
}

impl DriverConfiguration {
    fn from_options(options: &Options) -> NetworkResult<Self> {
        let source = match options.get(labels::GENERIC_DATA) {
            Some(Value::Object(data)) => data.get(labels::ENABLE_IP_FORWARDING),
            Some(Value::Null) | None => options.get(labels::ENABLE_IP_FORWARDING),
            Some(other) => {
                return Err(NetworkError::BadRequest(format!(
                    "invalid bridge driver options: {}",
                    other
                )))
            }
        };
        let enable_ip_forwarding = match source {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(NetworkError::BadRequest(format!(
                    "invalid bridge driver options: {} must be a boolean, got {}",
                    labels::ENABLE_IP_FORWARDING,
                    other
                )))
            }
        };
        Ok(Self {
            enable_ip_forwarding,
        })
    }
}

/// Per-network options found under `GENERIC_DATA`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NetworkConfiguration {
    #[serde(rename = "BridgeName")]
    bridge_name: Option<String>,
    #[serde(rename = "AddressIPv4")]
    address_ipv4: Option<Ipv4Network>,
    #[serde(rename = "FixedCIDR")]
    fixed_cidr: Option<Ipv4Network>,
    #[serde(rename = "FixedCIDRv6")]
    fixed_cidr_v6: Option<Ipv6Network>,
    #[serde(rename = "EnableIPv6")]
    enable_ipv6: bool,
    #[serde(rename = "AllowNonDefaultBridge")]
    allow_non_default_bridge: bool,
}

impl NetworkConfiguration {
    fn from_options(options: &Options) -> NetworkResult<Self> {
        let mut config: Self = match options.get(labels::GENERIC_DATA) {
            None | Some(Value::Null) => Self::default(),
            Some(data) => serde_json::from_value(data.clone()).map_err(|e| {
                NetworkError::BadRequest(format!("invalid bridge network options: {}", e))
            })?,
        };
        config.enable_ipv6 |= option_flag(options, labels::ENABLE_IPV6);
        Ok(config)
    }

    fn bridge_name(&self) -> &str {
        self.bridge_name.as_deref().unwrap_or(DEFAULT_BRIDGE_NAME)
    }
}

struct BridgeEndpoint {
    address: Ipv4Network,
    address_v6: Option<Ipv6Network>,
    mac: String,
    port_mapping: Vec<PortBinding>,
    joined: bool,
}

struct BridgeNetwork {
    bridge_name: String,
    /// Network address and prefix of the bridge subnet
    subnet: Ipv4Network,
    gateway: Ipv4Addr,
    /// Range container addresses are drawn from
    pool: Ipv4Network,
    subnet_v6: Option<Ipv6Network>,
    gateway_v6: Option<Ipv6Addr>,
    endpoints: Mutex<HashMap<String, BridgeEndpoint>>,
}

impl BridgeNetwork {
    fn allocate_ipv4(&self, taken: &HashSet<Ipv4Addr>) -> NetworkResult<Ipv4Network> {
        let network = u32::from(self.subnet.network());
        let broadcast = u32::from(self.subnet.broadcast());
        let first = u32::from(self.pool.network()).max(network + 1);
        let last = u32::from(self.pool.broadcast()).min(broadcast.saturating_sub(1));

        (first..=last)
            .map(Ipv4Addr::from)
            .find(|ip| *ip != self.gateway && !taken.contains(ip))
            .map(|ip| Ipv4Network::new(ip, self.subnet.prefix()))
            .transpose()
            .map_err(|e| NetworkError::Driver(e.to_string()))?
            .ok_or_else(|| {
                NetworkError::Forbidden(format!(
                    "no free address left in {} on bridge {}",
                    self.pool, self.bridge_name
                ))
            })
    }

    fn allocate_ipv6(&self, taken: &HashSet<Ipv6Addr>) -> NetworkResult<Option<Ipv6Network>> {
        let Some(subnet) = self.subnet_v6 else {
            return Ok(None);
        };

        let base = u128::from(subnet.network());
        let size = 1u128
            .checked_shl(128 - u32::from(subnet.prefix()))
            .unwrap_or(u128::MAX);

        (1..size)
            .map(|offset| Ipv6Addr::from(base + offset))
            .find(|ip| Some(*ip) != self.gateway_v6 && !taken.contains(ip))
            .map(|ip| Ipv6Network::new(ip, subnet.prefix()))
            .transpose()
            .map_err(|e| NetworkError::Driver(e.to_string()))?
            .map(Some)
            .ok_or_else(|| NetworkError::Forbidden(format!("no free IPv6 address left in {}", subnet)))
    }
}

/// Host port reservations shared by every bridge network
#[derive(Default)]
struct PortAllocator {
    used: HashSet<(Protocol, u16)>,
}

impl PortAllocator {
    fn allocate(&mut self, binding: &PortBinding) -> NetworkResult<u16> {
        let range = match (binding.host_port, binding.host_port_end) {
            (0, _) => EPHEMERAL_PORTS,
            (start, Some(end)) if end >= start => start..=end,
            (port, _) => {
                if !self.used.insert((binding.proto, port)) {
                    return Err(NetworkError::Forbidden(format!(
                        "host port {}/{} is already allocated",
                        port, binding.proto
                    )));
                }
                return Ok(port);
            }
        };

        let start = *range.start();
        let end = *range.end();
        let port = range
            .into_iter()
            .find(|p| !self.used.contains(&(binding.proto, *p)))
            .ok_or_else(|| {
                NetworkError::Forbidden(format!(
                    "no free host port in {}-{}/{}",
                    start, end, binding.proto
                ))
            })?;
        self.used.insert((binding.proto, port));
        Ok(port)
    }

    fn release(&mut self, bindings: &[PortBinding]) {
        for b in bindings {
            self.used.remove(&(b.proto, b.host_port));
        }
    }
}

/// MAC address derived from the IPv4 address, `02:42:` prefixed
pub fn mac_from_ipv4(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("02:42:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d)
}

/// In-process bridge driver
pub struct BridgeDriver {
    /// Write host sysctls; off when namespaces are simulated
    apply_host_settings: bool,
    networks: RwLock<HashMap<String, Arc<BridgeNetwork>>>,
    ports: Mutex<PortAllocator>,
}

impl BridgeDriver {
    pub fn new(apply_host_settings: bool) -> Self {
        Self {
            apply_host_settings,
            networks: RwLock::new(HashMap::new()),
            ports: Mutex::new(PortAllocator::default()),
        }
    }

    fn network(&self, network_id: &str) -> NetworkResult<Arc<BridgeNetwork>> {
        self.networks
            .read()
            .get(network_id)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchNetwork(format!("id {}", network_id)))
    }

    /// First `172.(18+n).0.0/16` not used by another network
    fn next_subnet(networks: &HashMap<String, Arc<BridgeNetwork>>) -> NetworkResult<Ipv4Network> {
        (18u8..=31)
            .filter_map(|second| Ipv4Network::new(Ipv4Addr::new(172, second, 0, 0), 16).ok())
            .find(|candidate| !networks.values().any(|n| n.subnet.overlaps(*candidate)))
            .ok_or_else(|| NetworkError::Forbidden("no free bridge subnet available".into()))
    }

    fn build_network(
        config: &NetworkConfiguration,
        networks: &HashMap<String, Arc<BridgeNetwork>>,
    ) -> NetworkResult<BridgeNetwork> {
        let bridge_name = config.bridge_name().to_string();

        let requested = match config.address_ipv4 {
            Some(addr) => addr,
            None if bridge_name == DEFAULT_BRIDGE_NAME => {
                Ipv4Network::new(Ipv4Addr::new(172, 17, 0, 0), 16)
                    .map_err(|e| NetworkError::Driver(e.to_string()))?
            }
            None => Self::next_subnet(networks)?,
        };

        let subnet = Ipv4Network::new(requested.network(), requested.prefix())
            .map_err(|e| NetworkError::Driver(e.to_string()))?;
        if subnet.prefix() > 30 {
            return Err(NetworkError::BadRequest(format!(
                "subnet {} is too small for a bridge",
                subnet
            )));
        }
        if let Some(other) = networks.values().find(|n| n.subnet.overlaps(subnet)) {
            return Err(NetworkError::Forbidden(format!(
                "subnet {} overlaps with bridge {}",
                subnet, other.bridge_name
            )));
        }

        let gateway = if requested.ip() != subnet.network() {
            requested.ip()
        } else {
            Ipv4Addr::from(u32::from(subnet.network()) + 1)
        };

        let pool = match config.fixed_cidr {
            Some(cidr) => {
                let pool = Ipv4Network::new(cidr.network(), cidr.prefix())
                    .map_err(|e| NetworkError::Driver(e.to_string()))?;
                if !subnet.contains(pool.network()) || pool.prefix() < subnet.prefix() {
                    return Err(NetworkError::BadRequest(format!(
                        "FixedCIDR {} is not within {}",
                        pool, subnet
                    )));
                }
                pool
            }
            None => subnet,
        };

        let (subnet_v6, gateway_v6) = match (config.enable_ipv6, config.fixed_cidr_v6) {
            (true, Some(cidr)) => {
                if cidr.prefix() < MIN_IPV6_PREFIX {
                    return Err(NetworkError::BadRequest(format!(
                        "FixedCIDRv6 {} is wider than /{}",
                        cidr, MIN_IPV6_PREFIX
                    )));
                }
                let net = Ipv6Network::new(cidr.network(), cidr.prefix())
                    .map_err(|e| NetworkError::Driver(e.to_string()))?;
                let gw = if cidr.ip() != net.network() {
                    cidr.ip()
                } else {
                    Ipv6Addr::from(u128::from(net.network()) + 1)
                };
                (Some(net), Some(gw))
            }
            _ => (None, None),
        };

        Ok(BridgeNetwork {
            bridge_name,
            subnet,
            gateway,
            pool,
            subnet_v6,
            gateway_v6,
            endpoints: Mutex::new(HashMap::new()),
        })
    }

    fn allocate_ports(
        &self,
        requested: &[PortBinding],
        container_ip: Ipv4Addr,
    ) -> NetworkResult<Vec<PortBinding>> {
        let mut ports = self.ports.lock();
        let mut allocated: Vec<PortBinding> = Vec::with_capacity(requested.len());

        for binding in requested {
            match ports.allocate(binding) {
                Ok(host_port) => allocated.push(PortBinding {
                    ip: Some(IpAddr::V4(container_ip)),
                    host_port,
                    ..binding.clone()
                }),
                Err(e) => {
                    ports.release(&allocated);
                    return Err(e);
                }
            }
        }
        Ok(allocated)
    }
}

impl Driver for BridgeDriver {
    fn driver_type(&self) -> &str {
        BRIDGE
    }

    fn config(&self, options: &Options) -> NetworkResult<()> {
        let config = DriverConfiguration::from_options(options)?;

        if config.enable_ip_forwarding {
            if self.apply_host_settings {
                if let Err(e) = std::fs::write(IP_FORWARD_PATH, "1\n") {
                    warn!(error = %e, "failed to enable IPv4 forwarding");
                }
            } else {
                debug!("IPv4 forwarding requested, host settings are not applied");
            }
        }
        Ok(())
    }

    fn create_network(&self, network_id: &str, options: &Options) -> NetworkResult<()> {
        let config = NetworkConfiguration::from_options(options)?;
        let bridge_name = config.bridge_name();

        if bridge_name != DEFAULT_BRIDGE_NAME && !config.allow_non_default_bridge {
            return Err(NetworkError::Forbidden(format!(
                "bridge name {} requires AllowNonDefaultBridge",
                bridge_name
            )));
        }

        let mut networks = self.networks.write();
        if networks.contains_key(network_id) {
            return Err(NetworkError::Forbidden(format!(
                "network {} already exists in the bridge driver",
                network_id
            )));
        }
        if networks.values().any(|n| n.bridge_name == bridge_name) {
            return Err(NetworkError::Forbidden(format!(
                "bridge {} is already in use",
                bridge_name
            )));
        }

        let network = Self::build_network(&config, &networks)?;
        info!(
            network_id,
            bridge = %network.bridge_name,
            subnet = %network.subnet,
            gateway = %network.gateway,
            "bridge network created"
        );
        networks.insert(network_id.to_string(), Arc::new(network));
        Ok(())
    }

    fn delete_network(&self, network_id: &str) -> NetworkResult<()> {
        let network = self
            .networks
            .write()
            .remove(network_id)
            .ok_or_else(|| NetworkError::NoSuchNetwork(format!("id {}", network_id)))?;

        let mut ports = self.ports.lock();
        for ep in network.endpoints.lock().values() {
            ports.release(&ep.port_mapping);
        }
        debug!(network_id, bridge = %network.bridge_name, "bridge network deleted");
        Ok(())
    }

    fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        options: &Options,
    ) -> NetworkResult<Vec<InterfaceInfo>> {
        let network = self.network(network_id)?;
        let requested_ports = port_bindings(options)
            .map_err(|e| NetworkError::BadRequest(format!("invalid port mapping: {}", e)))?;
        let requested_mac = options
            .get(labels::MAC_ADDRESS)
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut endpoints = network.endpoints.lock();
        if endpoints.contains_key(endpoint_id) {
            return Err(NetworkError::Forbidden(format!(
                "endpoint {} already exists",
                endpoint_id
            )));
        }

        let taken_v4: HashSet<Ipv4Addr> = endpoints.values().map(|e| e.address.ip()).collect();
        let taken_v6: HashSet<Ipv6Addr> = endpoints
            .values()
            .filter_map(|e| e.address_v6.map(|a| a.ip()))
            .collect();

        let address = network.allocate_ipv4(&taken_v4)?;
        let address_v6 = network.allocate_ipv6(&taken_v6)?;
        let mac = requested_mac.unwrap_or_else(|| mac_from_ipv4(address.ip()));
        let port_mapping = self.allocate_ports(&requested_ports, address.ip())?;

        debug!(
            network_id,
            endpoint_id,
            address = %address,
            ports = port_mapping.len(),
            "bridge endpoint created"
        );

        endpoints.insert(
            endpoint_id.to_string(),
            BridgeEndpoint {
                address,
                address_v6,
                mac: mac.clone(),
                port_mapping,
                joined: false,
            },
        );

        Ok(vec![InterfaceInfo {
            id: 0,
            address: Some(address),
            address_v6,
            mac_address: Some(mac),
        }])
    }

    fn endpoint_oper_info(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<Options> {
        let network = self.network(network_id)?;
        let endpoints = network.endpoints.lock();
        let ep = endpoints
            .get(endpoint_id)
            .ok_or_else(|| NetworkError::NoSuchEndpoint(format!("id {}", endpoint_id)))?;

        let mut info = Options::new();
        info.insert(
            labels::PORT_MAP.to_string(),
            serde_json::to_value(&ep.port_mapping)?,
        );
        info.insert(labels::MAC_ADDRESS.to_string(), Value::String(ep.mac.clone()));
        Ok(info)
    }

    fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()> {
        let network = self.network(network_id)?;
        let ep = network
            .endpoints
            .lock()
            .remove(endpoint_id)
            .ok_or_else(|| NetworkError::NoSuchEndpoint(format!("id {}", endpoint_id)))?;

        self.ports.lock().release(&ep.port_mapping);
        debug!(network_id, endpoint_id, "bridge endpoint deleted");
        Ok(())
    }

    fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        _options: &Options,
    ) -> NetworkResult<JoinInfo> {
        let network = self.network(network_id)?;
        let mut endpoints = network.endpoints.lock();
        let ep = endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| NetworkError::NoSuchEndpoint(format!("id {}", endpoint_id)))?;

        ep.joined = true;
        debug!(network_id, endpoint_id, sandbox_key, "bridge endpoint joined");

        let src_name: String = format!(
            "{}{}",
            VETH_PREFIX,
            endpoint_id.chars().take(7).collect::<String>()
        );
        Ok(JoinInfo {
            interface_names: vec![InterfaceName {
                src_name,
                dst_prefix: CONTAINER_IF_PREFIX.to_string(),
            }],
            gateway: Some(network.gateway),
            gateway_v6: ep.address_v6.and(network.gateway_v6),
        })
    }

    fn leave(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()> {
        let network = self.network(network_id)?;
        let mut endpoints = network.endpoints.lock();
        let ep = endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| NetworkError::NoSuchEndpoint(format!("id {}", endpoint_id)))?;

        if !ep.joined {
            return Err(NetworkError::Forbidden(format!(
                "endpoint {} is not joined",
                endpoint_id
            )));
        }
        ep.joined = false;
        Ok(())
    }
}
