/*!
 * Core Types
 * Option envelope and port mapping records shared by drivers and the controller
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use super::labels;

/// Generic option map passed through to drivers
pub type Options = BTreeMap<String, Value>;

/// Wrap a driver-specific option object under the `GENERIC_DATA` label
pub fn generic_options(data: Value) -> Options {
    let mut options = Options::new();
    options.insert(labels::GENERIC_DATA.to_string(), data);
    options
}

/// Read a boolean flag, accepting JSON booleans and "true"/"1" strings
pub fn option_flag(options: &Options, key: &str) -> bool {
    match options.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true" || s == "1",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// Transport protocol of a port binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Port mapping between a container port and a host port
///
/// A zero `host_port` asks the driver to allocate one. When `host_port_end` is
/// set the driver picks a free port from `host_port..=host_port_end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    pub proto: Protocol,
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    pub port: u16,
    #[serde(rename = "HostIP", default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<IpAddr>,
    #[serde(default)]
    pub host_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port_end: Option<u16>,
}

impl PortBinding {
    pub fn tcp(port: u16, host_port: u16) -> Self {
        Self {
            proto: Protocol::Tcp,
            port,
            host_port,
            ..Default::default()
        }
    }

    pub fn udp(port: u16, host_port: u16) -> Self {
        Self {
            proto: Protocol::Udp,
            port,
            host_port,
            ..Default::default()
        }
    }

    pub fn with_host_range(mut self, end: u16) -> Self {
        self.host_port_end = Some(end);
        self
    }

    pub fn with_host_ip(mut self, ip: IpAddr) -> Self {
        self.host_ip = Some(ip);
        self
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = self.ip.map(|ip| ip.to_string()).unwrap_or_default();
        let host_ip = self.host_ip.map(|ip| ip.to_string()).unwrap_or_default();
        write!(
            f,
            "{}/{}:{}/{}:{}",
            self.proto, ip, self.port, host_ip, self.host_port
        )
    }
}

/// Decode the port bindings stored under `PORT_MAP`, if any
pub fn port_bindings(options: &Options) -> Result<Vec<PortBinding>, serde_json::Error> {
    match options.get(labels::PORT_MAP) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()),
    }
}
