/*!
 * Network Namespace Types
 * Identifiers, interface placement requests and counters
 */

use ipnetwork::{Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Result type for namespace operations
pub type NamespaceResult<T> = Result<T, NamespaceError>;

/// Network namespace errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum NamespaceError {
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Namespace not found: {0}")]
    NotFound(String),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network operation failed: {0}")]
    NetworkError(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for NamespaceError {
    fn from(err: std::io::Error) -> Self {
        NamespaceError::IoError(err.to_string())
    }
}

/// A namespace is identified by the path of its key file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceId(pub String);

impl NamespaceId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network namespace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub id: NamespaceId,
    /// Bring the loopback interface up after creation
    pub loopback: bool,
}

impl NamespaceConfig {
    pub fn new(id: NamespaceId) -> Self {
        Self { id, loopback: true }
    }
}

/// Interface to move into a namespace
///
/// `src_name` is the device announced by the driver. Inside the namespace it
/// is renamed to `dst_prefix` followed by the lowest unused index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub src_name: String,
    pub dst_prefix: String,
    pub address: Option<Ipv4Network>,
    pub address_v6: Option<Ipv6Network>,
    pub mac: Option<String>,
    pub gateway: Option<Ipv4Addr>,
    pub gateway_v6: Option<Ipv6Addr>,
}

/// Per-interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStatistics {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
}

/// Network namespace information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub id: NamespaceId,
    /// Interfaces placed by this manager, loopback excluded
    pub interfaces: Vec<String>,
    pub platform: PlatformType,
    pub created_at: SystemTime,
}

/// Platform implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    /// Linux network namespaces
    LinuxNetns,
    /// In-memory bookkeeping only
    Simulation,
}

/// Lowest `<prefix><n>` not present in `existing`
pub fn next_interface_name<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let used: Vec<u32> = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .collect();

    let index = (0..).find(|i| !used.contains(i)).unwrap_or_default();
    format!("{}{}", prefix, index)
}
