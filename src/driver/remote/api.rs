/*!
 * Remote Driver Wire Types
 * JSON bodies of the plugin activation handshake and NetworkDriver RPCs
 */

use crate::core::types::Options;
use serde::{Deserialize, Serialize};

/// Media type of every plugin request and response
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

/// Capability a plugin must announce to serve as a network driver
pub const NETWORK_DRIVER_ENDPOINT: &str = "NetworkDriver";

pub const ACTIVATE_METHOD: &str = "Plugin.Activate";
pub const CREATE_NETWORK: &str = "NetworkDriver.CreateNetwork";
pub const DELETE_NETWORK: &str = "NetworkDriver.DeleteNetwork";
pub const CREATE_ENDPOINT: &str = "NetworkDriver.CreateEndpoint";
pub const ENDPOINT_OPER_INFO: &str = "NetworkDriver.EndpointOperInfo";
pub const DELETE_ENDPOINT: &str = "NetworkDriver.DeleteEndpoint";
pub const JOIN: &str = "NetworkDriver.Join";
pub const LEAVE: &str = "NetworkDriver.Leave";

/// Every response may carry an error message
pub trait PluginResponse: Default {
    fn err(&self) -> &str;
}

macro_rules! plugin_response {
    ($($ty:ty),* $(,)?) => {
        $(impl PluginResponse for $ty {
            fn err(&self) -> &str {
                &self.err
            }
        })*
    };
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub err: String,
}

/// Response of calls that only report success or failure
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    #[serde(default)]
    pub err: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "Options")]
    pub options: Options,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteNetworkRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
}

/// Interface as exchanged on the wire; empty strings mean "unset"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointInterface {
    #[serde(rename = "ID", default)]
    pub id: usize,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "AddressIPv6", default)]
    pub address_ipv6: String,
    #[serde(default)]
    pub mac_address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    #[serde(rename = "Interfaces")]
    pub interfaces: Vec<EndpointInterface>,
    #[serde(rename = "Options")]
    pub options: Options,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointResponse {
    #[serde(default)]
    pub interfaces: Vec<EndpointInterface>,
    #[serde(default)]
    pub err: String,
}

/// Request naming one endpoint; used by EndpointOperInfo, DeleteEndpoint and Leave
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointInfoResponse {
    #[serde(default)]
    pub value: Options,
    #[serde(default)]
    pub err: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    #[serde(rename = "SandboxKey")]
    pub sandbox_key: String,
    #[serde(rename = "Options")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceNameEntry {
    #[serde(default)]
    pub src_name: String,
    #[serde(default)]
    pub dst_prefix: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JoinResponse {
    #[serde(default)]
    pub interface_names: Vec<InterfaceNameEntry>,
    #[serde(default)]
    pub gateway: String,
    #[serde(rename = "GatewayIPv6", default)]
    pub gateway_ipv6: String,
    #[serde(default)]
    pub err: String,
}

plugin_response!(
    ActivateResponse,
    Response,
    CreateEndpointResponse,
    EndpointInfoResponse,
    JoinResponse,
);
