/*!
 * Data Store Module
 * Key/value persistence of network and endpoint records
 */

mod memory;

pub use memory::MemoryStore;

use crate::core::errors::NetworkResult;
use crate::core::types::Options;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value backing store the controller writes through
pub trait DataStore: Send + Sync {
    fn put(&self, key: &str, value: Value) -> NetworkResult<()>;

    fn get(&self, key: &str) -> NetworkResult<Option<Value>>;

    /// Delete a key, returning whether it existed
    fn delete(&self, key: &str) -> NetworkResult<bool>;

    /// All entries whose key starts with `prefix`, ordered by key
    fn list(&self, prefix: &str) -> NetworkResult<Vec<(String, Value)>>;
}

/// Key of a network record
pub fn network_key(network_id: &str) -> String {
    format!("network/{}", network_id)
}

/// Key of an endpoint record
pub fn endpoint_key(network_id: &str, endpoint_id: &str) -> String {
    format!("endpoint/{}/{}", network_id, endpoint_id)
}

/// Persisted form of a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub network_type: String,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub enable_ipv6: bool,
}

/// Persisted form of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: String,
    pub name: String,
    pub network_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
}
