/*!
 * Remote Driver
 * Driver implementation forwarding every call to a plugin over HTTP
 */

use super::api::*;
use super::client::PluginClient;
use super::discovery::PluginSpec;
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::types::Options;
use crate::driver::traits::Driver;
use crate::driver::types::{InterfaceInfo, InterfaceName, JoinInfo};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub struct RemoteDriver {
    driver_type: String,
    client: PluginClient,
}

impl RemoteDriver {
    /// Handshake with the plugin and check it serves network drivers
    pub fn activate(
        driver_type: &str,
        spec: &PluginSpec,
        timeout: Duration,
    ) -> NetworkResult<Self> {
        let client = PluginClient::new(&spec.name, &spec.url, timeout)?;
        let resp: ActivateResponse = client.call(ACTIVATE_METHOD, &serde_json::json!({}))?;

        if !resp.implements.iter().any(|i| i == NETWORK_DRIVER_ENDPOINT) {
            return Err(NetworkError::NotImplements {
                plugin: spec.name.clone(),
                implements: resp.implements,
            });
        }

        info!(plugin = %spec.name, url = %spec.url, driver_type, "remote driver activated");
        Ok(Self {
            driver_type: driver_type.to_string(),
            client,
        })
    }

    fn endpoint_request(network_id: &str, endpoint_id: &str) -> EndpointRequest {
        EndpointRequest {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        }
    }
}

fn parse_optional<T: FromStr>(field: &str, value: &str) -> NetworkResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| NetworkError::Driver(format!("plugin returned invalid {} {:?}: {}", field, value, e)))
}

impl Driver for RemoteDriver {
    fn driver_type(&self) -> &str {
        &self.driver_type
    }

    fn config(&self, _options: &Options) -> NetworkResult<()> {
        // Plugins receive their configuration out of band
        Ok(())
    }

    fn create_network(&self, network_id: &str, options: &Options) -> NetworkResult<()> {
        let req = CreateNetworkRequest {
            network_id: network_id.to_string(),
            options: options.clone(),
        };
        self.client.call::<_, Response>(CREATE_NETWORK, &req)?;
        Ok(())
    }

    fn delete_network(&self, network_id: &str) -> NetworkResult<()> {
        let req = DeleteNetworkRequest {
            network_id: network_id.to_string(),
        };
        self.client.call::<_, Response>(DELETE_NETWORK, &req)?;
        Ok(())
    }

    fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        options: &Options,
    ) -> NetworkResult<Vec<InterfaceInfo>> {
        let req = CreateEndpointRequest {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            interfaces: Vec::new(),
            options: options.clone(),
        };
        let resp: CreateEndpointResponse = self.client.call(CREATE_ENDPOINT, &req)?;

        resp.interfaces
            .iter()
            .map(|iface| {
                Ok(InterfaceInfo {
                    id: iface.id,
                    address: parse_optional("address", &iface.address)?,
                    address_v6: parse_optional("IPv6 address", &iface.address_ipv6)?,
                    mac_address: (!iface.mac_address.is_empty()).then(|| iface.mac_address.clone()),
                })
            })
            .collect()
    }

    fn endpoint_oper_info(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<Options> {
        let resp: EndpointInfoResponse = self
            .client
            .call(ENDPOINT_OPER_INFO, &Self::endpoint_request(network_id, endpoint_id))?;
        Ok(resp.value)
    }

    fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()> {
        self.client.call::<_, Response>(
            DELETE_ENDPOINT,
            &Self::endpoint_request(network_id, endpoint_id),
        )?;
        Ok(())
    }

    fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        options: &Options,
    ) -> NetworkResult<JoinInfo> {
        let req = JoinRequest {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            sandbox_key: sandbox_key.to_string(),
            options: options.clone(),
        };
        let resp: JoinResponse = self.client.call(JOIN, &req)?;

        Ok(JoinInfo {
            interface_names: resp
                .interface_names
                .into_iter()
                .map(|n| InterfaceName {
                    src_name: n.src_name,
                    dst_prefix: n.dst_prefix,
                })
                .collect(),
            gateway: parse_optional("gateway", &resp.gateway)?,
            gateway_v6: parse_optional("IPv6 gateway", &resp.gateway_ipv6)?,
        })
    }

    fn leave(&self, network_id: &str, endpoint_id: &str) -> NetworkResult<()> {
        self.client
            .call::<_, Response>(LEAVE, &Self::endpoint_request(network_id, endpoint_id))?;
        Ok(())
    }
}
