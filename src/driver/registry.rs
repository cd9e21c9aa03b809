/*!
 * Driver Registry
 * In-process drivers registered eagerly, plugins resolved on first use
 */

use super::remote::{PluginDiscovery, RemoteDriver};
use super::traits::Driver;
use crate::core::errors::{NetworkError, NetworkResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    discovery: PluginDiscovery,
    plugin_timeout: Duration,
}

impl DriverRegistry {
    pub fn new(plugin_dirs: Vec<PathBuf>, plugin_timeout: Duration) -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
            discovery: PluginDiscovery::new(plugin_dirs),
            plugin_timeout,
        }
    }

    /// Register a driver under `driver_type`
    pub fn register(&self, driver_type: &str, driver: Arc<dyn Driver>) -> NetworkResult<()> {
        let mut drivers = self.drivers.write();
        if drivers.contains_key(driver_type) {
            return Err(NetworkError::Forbidden(format!(
                "driver {} is already registered",
                driver_type
            )));
        }
        drivers.insert(driver_type.to_string(), driver);
        info!(driver_type, "driver registered");
        Ok(())
    }

    pub fn get(&self, driver_type: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.read().get(driver_type).cloned()
    }

    /// Registered driver, or a plugin activated through discovery
    pub fn resolve(&self, driver_type: &str) -> NetworkResult<Arc<dyn Driver>> {
        if let Some(driver) = self.get(driver_type) {
            return Ok(driver);
        }

        let spec = self.discovery.lookup(driver_type).map_err(|e| {
            debug!(driver_type, error = %e, "plugin lookup failed");
            NetworkError::NotFound(format!(
                "could not resolve driver {} in registry",
                driver_type
            ))
        })?;

        let remote: Arc<dyn Driver> =
            Arc::new(RemoteDriver::activate(driver_type, &spec, self.plugin_timeout)?);

        // Another caller may have activated the same plugin meanwhile
        let mut drivers = self.drivers.write();
        Ok(drivers
            .entry(driver_type.to_string())
            .or_insert(remote)
            .clone())
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.drivers.read().keys().cloned().collect();
        types.sort();
        types
    }
}
