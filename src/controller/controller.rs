/*!
 * Network Controller
 * Driver configuration, network and sandbox registries, built-in networks
 */

use crate::core::config::ControllerConfig;
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::id::generate_id;
use crate::core::types::Options;
use crate::driver::{
    BridgeDriver, Driver, DriverRegistry, HostDriver, NullDriver, BRIDGE, HOST, NULL,
};
use crate::namespace::{NamespaceConfig, NamespaceId, NamespaceManager};
use crate::network::Network;
use crate::sandbox::{Sandbox, SandboxOptions};
use crate::store::{network_key, DataStore, MemoryStore};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Names of the networks created at startup
pub const HOST_NETWORK: &str = "host";
pub const NONE_NETWORK: &str = "none";

#[derive(Default)]
struct NetworkTable {
    by_id: HashMap<String, Network>,
    /// Names reserved while the driver creates the network
    pending: HashSet<String>,
}

impl NetworkTable {
    fn has_name(&self, name: &str) -> bool {
        self.pending.contains(name) || self.by_id.values().any(|n| n.name() == name)
    }
}

#[derive(Default)]
struct SandboxTable {
    by_id: HashMap<String, Sandbox>,
    /// Container IDs reserved while their namespace is being created
    pending: HashSet<String>,
}

impl SandboxTable {
    fn has_container(&self, container_id: &str) -> bool {
        self.pending.contains(container_id)
            || self
                .by_id
                .values()
                .any(|sb| sb.container_id() == container_id)
    }
}

pub(crate) struct ControllerInner {
    pub(crate) id: String,
    pub(crate) config: ControllerConfig,
    pub(crate) drivers: DriverRegistry,
    pub(crate) namespaces: NamespaceManager,
    pub(crate) store: Arc<dyn DataStore>,
    networks: RwLock<NetworkTable>,
    sandboxes: RwLock<SandboxTable>,
    /// Whether the shared default namespace has been created
    default_ns: Mutex<bool>,
}

impl ControllerInner {
    /// Key of the shared default namespace, created on first use
    pub(crate) fn default_namespace(&self) -> NetworkResult<PathBuf> {
        let key = self.config.default_sandbox_key();
        let mut created = self.default_ns.lock();
        if !*created {
            let id = NamespaceId::from_path(&key);
            if !self.namespaces.exists(&id) {
                self.namespaces.create(NamespaceConfig::new(id))?;
            }
            *created = true;
            info!(key = %key.display(), "default sandbox namespace created");
        }
        Ok(key)
    }

    pub(crate) fn remove_sandbox(&self, sandbox_id: &str) {
        self.sandboxes.write().by_id.remove(sandbox_id);
    }

    pub(crate) fn remove_network(&self, network_id: &str) {
        self.networks.write().by_id.remove(network_id);
    }

    pub(crate) fn restore_network(&self, network: Network) {
        self.networks
            .write()
            .by_id
            .insert(network.id().to_string(), network);
    }

    /// Write a record through to the store; failures are logged, not returned
    pub(crate) fn persist<T: Serialize>(&self, key: &str, record: &T) {
        let result = serde_json::to_value(record)
            .map_err(NetworkError::from)
            .and_then(|value| self.store.put(key, value));
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist record");
        }
    }

    pub(crate) fn forget(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            warn!(key, error = %e, "failed to delete record");
        }
    }
}

/// Entry point of the network core
///
/// Handles are cheap to clone. Everything created through a controller keeps
/// only a weak reference back to it.
#[derive(Clone)]
pub struct Controller(Arc<ControllerInner>);

impl Controller {
    /// Controller backed by an in-memory store
    pub fn new(config: ControllerConfig) -> NetworkResult<Self> {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: ControllerConfig, store: Arc<dyn DataStore>) -> NetworkResult<Self> {
        let namespaces = NamespaceManager::new(config.namespace_mode);
        let drivers = DriverRegistry::new(config.plugin_dirs.clone(), config.plugin_timeout);

        drivers.register(
            BRIDGE,
            Arc::new(BridgeDriver::new(namespaces.has_true_isolation())),
        )?;
        drivers.register(HOST, Arc::new(HostDriver::new()))?;
        drivers.register(NULL, Arc::new(NullDriver::new()))?;

        let builtin_networks = config.builtin_networks;
        let controller = Self(Arc::new(ControllerInner {
            id: generate_id(),
            config,
            drivers,
            namespaces,
            store,
            networks: RwLock::new(NetworkTable::default()),
            sandboxes: RwLock::new(SandboxTable::default()),
            default_ns: Mutex::new(false),
        }));

        if builtin_networks {
            controller.create_network(HOST, HOST_NETWORK, Options::new(), true)?;
            controller.create_network(NULL, NONE_NETWORK, Options::new(), true)?;
        }

        info!(
            controller_id = %controller.0.id,
            platform = ?controller.0.namespaces.platform(),
            "network controller started"
        );
        Ok(controller)
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.0.config
    }

    pub fn store(&self) -> Arc<dyn DataStore> {
        self.0.store.clone()
    }

    /// Add an in-process driver
    pub fn register_driver(&self, driver_type: &str, driver: Arc<dyn Driver>) -> NetworkResult<()> {
        self.0.drivers.register(driver_type, driver)
    }

    /// Hand driver-wide options to the driver of `network_type`
    pub fn configure_network_driver(&self, network_type: &str, options: &Options) -> NetworkResult<()> {
        let driver = self.0.drivers.resolve(network_type)?;
        driver.config(options)?;
        debug!(network_type, "driver configured");
        Ok(())
    }

    /// Create a network of `network_type` named `name`
    pub fn new_network(
        &self,
        network_type: &str,
        name: &str,
        options: Options,
    ) -> NetworkResult<Network> {
        self.create_network(network_type, name, options, false)
    }

    fn create_network(
        &self,
        network_type: &str,
        name: &str,
        options: Options,
        builtin: bool,
    ) -> NetworkResult<Network> {
        if name.is_empty() {
            return Err(NetworkError::InvalidName(name.to_string()));
        }

        let driver = self.0.drivers.resolve(network_type)?;

        {
            let mut table = self.0.networks.write();
            if table.has_name(name) {
                return Err(NetworkError::NetworkNameConflict(name.to_string()));
            }
            table.pending.insert(name.to_string());
        }

        let id = generate_id();
        let result = driver.create_network(&id, &options);

        let mut table = self.0.networks.write();
        table.pending.remove(name);
        result?;

        let network = Network::new(&self.0, id, name, network_type, options, driver, builtin);
        table
            .by_id
            .insert(network.id().to_string(), network.clone());
        // Persisted before lookups can see the network
        self.0.persist(&network_key(network.id()), &network.record());
        drop(table);

        info!(
            network = name,
            network_id = network.id(),
            network_type,
            builtin,
            "network created"
        );
        Ok(network)
    }

    pub fn network_by_name(&self, name: &str) -> NetworkResult<Network> {
        if name.is_empty() {
            return Err(NetworkError::InvalidName(name.to_string()));
        }
        self.0
            .networks
            .read()
            .by_id
            .values()
            .find(|n| n.name() == name)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchNetwork(name.to_string()))
    }

    pub fn network_by_id(&self, id: &str) -> NetworkResult<Network> {
        if id.is_empty() {
            return Err(NetworkError::InvalidId(id.to_string()));
        }
        self.0
            .networks
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchNetwork(id.to_string()))
    }

    /// Snapshot of the registered networks
    pub fn networks(&self) -> Vec<Network> {
        self.0.networks.read().by_id.values().cloned().collect()
    }

    /// Visit networks until the visitor returns true
    pub fn walk_networks<F>(&self, mut visitor: F)
    where
        F: FnMut(&Network) -> bool,
    {
        for network in self.networks() {
            if visitor(&network) {
                break;
            }
        }
    }

    /// Allocate a sandbox for `container_id`
    pub fn new_sandbox(&self, container_id: &str, options: SandboxOptions) -> NetworkResult<Sandbox> {
        if container_id.is_empty() {
            return Err(NetworkError::InvalidId(container_id.to_string()));
        }

        {
            let mut table = self.0.sandboxes.write();
            if table.has_container(container_id) {
                return Err(NetworkError::Forbidden(format!(
                    "container {} already has a sandbox",
                    container_id
                )));
            }
            table.pending.insert(container_id.to_string());
        }

        let result = Sandbox::create(&self.0, container_id, options);

        let mut table = self.0.sandboxes.write();
        table.pending.remove(container_id);
        let sandbox = result?;
        table
            .by_id
            .insert(sandbox.id().to_string(), sandbox.clone());
        Ok(sandbox)
    }

    pub fn sandbox_by_id(&self, id: &str) -> NetworkResult<Sandbox> {
        if id.is_empty() {
            return Err(NetworkError::InvalidId(id.to_string()));
        }
        self.0
            .sandboxes
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| NetworkError::NoSuchSandbox(id.to_string()))
    }

    /// Snapshot of the live sandboxes
    pub fn sandboxes(&self) -> Vec<Sandbox> {
        self.0.sandboxes.read().by_id.values().cloned().collect()
    }

    /// Visit sandboxes until the visitor returns true
    pub fn walk_sandboxes<F>(&self, mut visitor: F)
    where
        F: FnMut(&Sandbox) -> bool,
    {
        for sandbox in self.sandboxes() {
            if visitor(&sandbox) {
                break;
            }
        }
    }

    /// Delete every sandbox and tear down the shared default namespace
    pub fn stop(&self) -> NetworkResult<()> {
        let mut first_error = None;

        for sandbox in self.sandboxes() {
            if let Err(e) = sandbox.delete() {
                warn!(sandbox_id = sandbox.id(), error = %e, "sandbox delete during stop failed");
                first_error.get_or_insert(e);
            }
        }

        let mut created = self.0.default_ns.lock();
        if *created {
            let id = NamespaceId::from_path(&self.0.config.default_sandbox_key());
            if let Err(e) = self.0.namespaces.destroy(&id) {
                warn!(error = %e, "failed to destroy default namespace");
                first_error.get_or_insert(e.into());
            }
            *created = false;
        }
        drop(created);

        info!(controller_id = %self.0.id, "network controller stopped");
        first_error.map_or(Ok(()), Err)
    }
}
