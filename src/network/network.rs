/*!
 * Network
 * Named, typed collection of endpoints backed by one driver
 */

use super::endpoint::{Endpoint, EndpointOptions};
use crate::controller::ControllerInner;
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::id::generate_id;
use crate::core::labels;
use crate::core::types::{option_flag, Options};
use crate::driver::Driver;
use crate::store::{network_key, NetworkRecord};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

#[derive(Default)]
struct EndpointTable {
    by_id: HashMap<String, Endpoint>,
    /// Names reserved while the driver allocates the endpoint
    pending: HashSet<String>,
    deleted: bool,
}

impl EndpointTable {
    fn has_name(&self, name: &str) -> bool {
        self.pending.contains(name) || self.by_id.values().any(|ep| ep.name() == name)
    }
}

/// Endpoint name held while the driver allocates; released on every exit path
struct NameReservation<'a> {
    table: &'a RwLock<EndpointTable>,
    name: &'a str,
    committed: bool,
}

impl<'a> NameReservation<'a> {
    /// Caller has already inserted `name` into the pending set
    fn adopt(table: &'a RwLock<EndpointTable>, name: &'a str) -> Self {
        Self {
            table,
            name,
            committed: false,
        }
    }

    /// Swap the reservation for the created endpoint
    fn commit(mut self, endpoint: &Endpoint) {
        let mut table = self.table.write();
        table.pending.remove(self.name);
        table
            .by_id
            .insert(endpoint.id().to_string(), endpoint.clone());
        endpoint.persist(None);
        drop(table);
        self.committed = true;
    }
}

impl Drop for NameReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.table.write().pending.remove(self.name);
        }
    }
}

pub(crate) struct NetworkInner {
    pub(crate) id: String,
    pub(crate) name: String,
    network_type: String,
    options: Options,
    pub(crate) enable_ipv6: bool,
    builtin: bool,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) controller: Weak<ControllerInner>,
    pub(crate) controller_id: String,
    endpoints: RwLock<EndpointTable>,
}

impl NetworkInner {
    pub(crate) fn remove_endpoint(&self, endpoint_id: &str) {
        self.endpoints.write().by_id.remove(endpoint_id);
    }
}

/// Handle to a network; clones share state
#[derive(Clone)]
pub struct Network(Arc<NetworkInner>);

/// IPv6 is on when either the top-level label or the driver's generic data asks for it
fn ipv6_requested(options: &Options) -> bool {
    let generic = options
        .get(labels::GENERIC_DATA)
        .and_then(|g| g.get("EnableIPv6"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    generic || option_flag(options, labels::ENABLE_IPV6)
}

impl Network {
    pub(crate) fn new(
        controller: &Arc<ControllerInner>,
        id: String,
        name: &str,
        network_type: &str,
        options: Options,
        driver: Arc<dyn Driver>,
        builtin: bool,
    ) -> Self {
        Self(Arc::new(NetworkInner {
            id,
            name: name.to_string(),
            network_type: network_type.to_string(),
            enable_ipv6: ipv6_requested(&options),
            options,
            builtin,
            driver,
            controller: Arc::downgrade(controller),
            controller_id: controller.id.clone(),
            endpoints: RwLock::new(EndpointTable::default()),
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn network_type(&self) -> &str {
        &self.0.network_type
    }

    pub fn enable_ipv6(&self) -> bool {
        self.0.enable_ipv6
    }

    /// Built-in networks (`host`, `none`) cannot be deleted
    pub fn is_builtin(&self) -> bool {
        self.0.builtin
    }

    pub fn options(&self) -> &Options {
        &self.0.options
    }

    pub(crate) fn record(&self) -> NetworkRecord {
        NetworkRecord {
            id: self.0.id.clone(),
            name: self.0.name.clone(),
            network_type: self.0.network_type.clone(),
            options: self.0.options.clone(),
            enable_ipv6: self.0.enable_ipv6,
        }
    }

    /// Allocate a new endpoint through the driver
    pub fn create_endpoint(&self, name: &str, options: EndpointOptions) -> NetworkResult<Endpoint> {
        if name.is_empty() {
            return Err(NetworkError::InvalidName(name.to_string()));
        }

        let reservation = {
            let mut table = self.0.endpoints.write();
            if table.deleted {
                return Err(self.unknown());
            }
            if table.has_name(name) {
                return Err(NetworkError::Forbidden(format!(
                    "service endpoint with name {} already exists",
                    name
                )));
            }
            table.pending.insert(name.to_string());
            drop(table);
            NameReservation::adopt(&self.0.endpoints, name)
        };

        let endpoint = self.allocate_endpoint(name, options)?;
        reservation.commit(&endpoint);
        info!(
            endpoint = name,
            endpoint_id = endpoint.id(),
            network = %self.0.name,
            "endpoint created"
        );
        Ok(endpoint)
    }

    fn allocate_endpoint(&self, name: &str, options: EndpointOptions) -> NetworkResult<Endpoint> {
        let id = generate_id();
        let driver_options = options.driver_options()?;
        let interfaces = self
            .0
            .driver
            .create_endpoint(&self.0.id, &id, &driver_options)?;
        Ok(Endpoint::new(id, name, &self.0, interfaces, options))
    }

    /// Unregister the network and release its driver resources
    pub fn delete(&self) -> NetworkResult<()> {
        let Some(controller) = self.0.controller.upgrade() else {
            return Err(self.unknown());
        };

        {
            let mut table = self.0.endpoints.write();
            if table.deleted {
                return Err(self.unknown());
            }
            let count = table.by_id.len() + table.pending.len();
            if count > 0 {
                return Err(NetworkError::ActiveEndpoints {
                    name: self.0.name.clone(),
                    id: self.0.id.clone(),
                    count,
                });
            }
            if self.0.builtin {
                return Err(NetworkError::Forbidden(format!(
                    "{} is a pre-defined network and cannot be removed",
                    self.0.name
                )));
            }
            table.deleted = true;
        }

        controller.remove_network(&self.0.id);

        if let Err(e) = self.0.driver.delete_network(&self.0.id) {
            warn!(network = %self.0.name, error = %e, "driver refused network delete, restoring");
            self.0.endpoints.write().deleted = false;
            controller.restore_network(self.clone());
            return Err(e);
        }

        controller.forget(&network_key(&self.0.id));
        info!(network = %self.0.name, network_id = %self.0.id, "network deleted");
        Ok(())
    }

    pub fn endpoint_by_name(&self, name: &str) -> NetworkResult<Endpoint> {
        if name.is_empty() {
            return Err(NetworkError::InvalidName(name.to_string()));
        }
        self.0
            .endpoints
            .read()
            .by_id
            .values()
            .find(|ep| ep.name() == name)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchEndpoint(name.to_string()))
    }

    pub fn endpoint_by_id(&self, id: &str) -> NetworkResult<Endpoint> {
        if id.is_empty() {
            return Err(NetworkError::InvalidId(id.to_string()));
        }
        self.0
            .endpoints
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchEndpoint(id.to_string()))
    }

    /// Snapshot of the current endpoints
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.0.endpoints.read().by_id.values().cloned().collect()
    }

    /// Visit endpoints until the visitor returns true
    pub fn walk_endpoints<F>(&self, mut visitor: F)
    where
        F: FnMut(&Endpoint) -> bool,
    {
        for ep in self.endpoints() {
            if visitor(&ep) {
                debug!(network = %self.0.name, endpoint = ep.name(), "endpoint walk stopped");
                break;
            }
        }
    }

    fn unknown(&self) -> NetworkError {
        NetworkError::UnknownNetwork {
            name: self.0.name.clone(),
            id: self.0.id.clone(),
        }
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Network {}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("type", &self.0.network_type)
            .finish()
    }
}
