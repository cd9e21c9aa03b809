/*!
 * Endpoint
 * Attachment point of a network; joins at most one sandbox at a time
 */

use super::network::NetworkInner;
use crate::controller::ControllerInner;
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::labels;
use crate::core::types::{Options, PortBinding};
use crate::driver::{Driver, InterfaceInfo, JoinInfo};
use crate::sandbox::{Sandbox, SandboxHandle, SandboxInner};
use crate::store::{endpoint_key, EndpointRecord};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Options accepted by `Network::create_endpoint`
#[derive(Debug, Clone, Default)]
pub struct EndpointOptions {
    pub port_mapping: Vec<PortBinding>,
    pub mac_address: Option<String>,
    /// Extra driver options passed through untouched
    pub generic: Options,
}

impl EndpointOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port_mapping(mut self, bindings: Vec<PortBinding>) -> Self {
        self.port_mapping = bindings;
        self
    }

    pub fn with_mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(mac.into());
        self
    }

    pub fn with_generic(mut self, options: Options) -> Self {
        self.generic = options;
        self
    }

    /// Option map handed to the driver
    pub fn driver_options(&self) -> NetworkResult<Options> {
        let mut options = self.generic.clone();
        if !self.port_mapping.is_empty() {
            let value = serde_json::to_value(&self.port_mapping)
                .map_err(|e| NetworkError::BadRequest(format!("invalid port mapping: {}", e)))?;
            options.insert(labels::PORT_MAP.to_string(), value);
        }
        if let Some(mac) = &self.mac_address {
            options.insert(labels::MAC_ADDRESS.to_string(), Value::String(mac.clone()));
        }
        Ok(options)
    }
}

struct JoinRecord {
    sandbox: Weak<SandboxInner>,
    sandbox_id: String,
    sandbox_key: String,
    info: JoinInfo,
}

#[derive(Default)]
struct EndpointState {
    interfaces: Vec<InterfaceInfo>,
    join: Option<JoinRecord>,
    deleted: bool,
}

pub(crate) struct EndpointInner {
    id: String,
    name: String,
    network_id: String,
    network_name: String,
    enable_ipv6: bool,
    driver: Arc<dyn Driver>,
    network: Weak<NetworkInner>,
    controller: Weak<ControllerInner>,
    controller_id: String,
    options: EndpointOptions,
    state: Mutex<EndpointState>,
}

/// Handle to an endpoint; clones share state
#[derive(Clone)]
pub struct Endpoint(Arc<EndpointInner>);

/// Snapshot of an endpoint's addressing and join state
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    interfaces: Vec<InterfaceInfo>,
    gateway: Option<Ipv4Addr>,
    gateway_v6: Option<Ipv6Addr>,
    sandbox_key: Option<String>,
    sandbox: Option<Sandbox>,
}

impl EndpointInfo {
    pub fn interface_list(&self) -> &[InterfaceInfo] {
        &self.interfaces
    }

    /// IPv4 gateway, set only while joined
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    pub fn gateway_v6(&self) -> Option<Ipv6Addr> {
        self.gateway_v6
    }

    pub fn sandbox_key(&self) -> Option<&str> {
        self.sandbox_key.as_deref()
    }

    /// The joined sandbox, if any
    pub fn sandbox(&self) -> Option<&Sandbox> {
        self.sandbox.as_ref()
    }
}

impl Endpoint {
    pub(crate) fn new(
        id: String,
        name: &str,
        network: &Arc<NetworkInner>,
        interfaces: Vec<InterfaceInfo>,
        options: EndpointOptions,
    ) -> Self {
        Self(Arc::new(EndpointInner {
            id,
            name: name.to_string(),
            network_id: network.id.clone(),
            network_name: network.name.clone(),
            enable_ipv6: network.enable_ipv6,
            driver: network.driver.clone(),
            network: Arc::downgrade(network),
            controller: network.controller.clone(),
            controller_id: network.controller_id.clone(),
            options,
            state: Mutex::new(EndpointState {
                interfaces,
                ..Default::default()
            }),
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn network_id(&self) -> &str {
        &self.0.network_id
    }

    pub fn network_name(&self) -> &str {
        &self.0.network_name
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.0.options
    }

    /// ID of the joined sandbox
    pub fn sandbox_id(&self) -> Option<String> {
        self.0
            .state
            .lock()
            .join
            .as_ref()
            .map(|j| j.sandbox_id.clone())
    }

    /// Accept only sandboxes created by this endpoint's controller
    fn validate_sandbox<'a>(
        &self,
        sandbox: Option<&'a dyn SandboxHandle>,
    ) -> NetworkResult<&'a Sandbox> {
        let handle = sandbox.ok_or_else(|| NetworkError::BadRequest("invalid sandbox".into()))?;
        let sandbox = handle.as_any().downcast_ref::<Sandbox>().ok_or_else(|| {
            NetworkError::BadRequest(format!(
                "sandbox {} was not created by a network controller",
                handle.id()
            ))
        })?;

        if sandbox.controller_id() != self.0.controller_id {
            return Err(NetworkError::BadRequest(format!(
                "sandbox {} belongs to another controller",
                sandbox.id()
            )));
        }
        Ok(sandbox)
    }

    /// Attach the endpoint to a sandbox
    pub fn join(&self, sandbox: Option<&dyn SandboxHandle>) -> NetworkResult<()> {
        let sandbox = self.validate_sandbox(sandbox)?;

        let mut state = self.0.state.lock();
        if state.deleted {
            return Err(NetworkError::NoSuchEndpoint(format!("id {}", self.0.id)));
        }
        if let Some(join) = &state.join {
            return Err(NetworkError::Forbidden(format!(
                "endpoint {} is already joined to sandbox {}",
                self.0.name, join.sandbox_id
            )));
        }

        let join_info = self.0.driver.join(
            &self.0.network_id,
            &self.0.id,
            sandbox.key(),
            &self.0.options.generic,
        )?;

        if let Err(e) =
            sandbox.attach_endpoint(self, &state.interfaces, &join_info, self.0.enable_ipv6)
        {
            if let Err(le) = self.0.driver.leave(&self.0.network_id, &self.0.id) {
                warn!(endpoint_id = %self.0.id, error = %le, "driver leave during join rollback failed");
            }
            return Err(e);
        }

        state.join = Some(JoinRecord {
            sandbox: sandbox.downgrade(),
            sandbox_id: sandbox.id().to_string(),
            sandbox_key: sandbox.key().to_string(),
            info: join_info,
        });
        self.persist(Some(sandbox.id()));
        drop(state);

        info!(
            endpoint = %self.0.name,
            network = %self.0.network_name,
            sandbox_id = sandbox.id(),
            "endpoint joined"
        );
        Ok(())
    }

    /// Detach the endpoint from the sandbox it joined
    ///
    /// The driver leave runs last; its error is returned after the endpoint
    /// and the sandbox already agree the join is gone.
    pub fn leave(&self, sandbox: Option<&dyn SandboxHandle>) -> NetworkResult<()> {
        let sandbox = self.validate_sandbox(sandbox)?;

        let mut state = self.0.state.lock();
        let joined_here = state
            .join
            .as_ref()
            .map(|j| j.sandbox_id == sandbox.id())
            .unwrap_or(false);
        if !joined_here {
            return Err(NetworkError::Forbidden(format!(
                "endpoint {} is not joined to sandbox {}",
                self.0.name,
                sandbox.id()
            )));
        }

        sandbox.detach_endpoint(&self.0.id);
        state.join = None;
        self.persist(None);
        drop(state);

        debug!(endpoint = %self.0.name, sandbox_id = sandbox.id(), "endpoint left");

        self.0.driver.leave(&self.0.network_id, &self.0.id)
    }

    /// Release driver resources and unregister from the network
    pub fn delete(&self) -> NetworkResult<()> {
        let mut state = self.0.state.lock();
        if state.deleted {
            return Err(NetworkError::NoSuchEndpoint(format!("id {}", self.0.id)));
        }
        if state.join.is_some() {
            return Err(NetworkError::ActiveContainer {
                name: self.0.name.clone(),
                id: self.0.id.clone(),
            });
        }

        self.0
            .driver
            .delete_endpoint(&self.0.network_id, &self.0.id)?;
        state.deleted = true;
        drop(state);

        if let Some(network) = self.0.network.upgrade() {
            network.remove_endpoint(&self.0.id);
        }
        if let Some(controller) = self.0.controller.upgrade() {
            controller.forget(&endpoint_key(&self.0.network_id, &self.0.id));
        }

        info!(endpoint = %self.0.name, network = %self.0.network_name, "endpoint deleted");
        Ok(())
    }

    /// Snapshot of interfaces, gateways and the joined sandbox
    pub fn info(&self) -> EndpointInfo {
        let state = self.0.state.lock();
        let join = state.join.as_ref();

        EndpointInfo {
            interfaces: state.interfaces.clone(),
            gateway: join.and_then(|j| j.info.gateway),
            gateway_v6: join.and_then(|j| j.info.gateway_v6),
            sandbox_key: join.map(|j| j.sandbox_key.clone()),
            sandbox: join
                .and_then(|j| j.sandbox.upgrade())
                .map(Sandbox::from_inner),
        }
    }

    /// Operational data reported by the driver
    pub fn driver_info(&self) -> NetworkResult<Options> {
        self.0
            .driver
            .endpoint_oper_info(&self.0.network_id, &self.0.id)
    }

    /// Callers hold the state lock so records land in join/leave order
    pub(crate) fn persist(&self, sandbox_id: Option<&str>) {
        let Some(controller) = self.0.controller.upgrade() else {
            return;
        };
        let record = EndpointRecord {
            id: self.0.id.clone(),
            name: self.0.name.clone(),
            network_id: self.0.network_id.clone(),
            sandbox_id: sandbox_id.map(str::to_string),
        };
        controller.persist(&endpoint_key(&self.0.network_id, &self.0.id), &record);
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Endpoint {}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("network", &self.0.network_name)
            .finish()
    }
}
