/*!
 * Simulation Network Namespaces
 * In-memory namespaces for unprivileged hosts and tests
 */

use super::traits::*;
use super::types::*;
use dashmap::DashMap;
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

/// Simulation-based namespace manager
///
/// Keeps the key file on disk so paths behave like real namespaces, but no
/// kernel state is touched. Every namespace starts with a loopback interface.
#[derive(Clone)]
pub struct SimulationNamespaceManager {
    namespaces: Arc<DashMap<NamespaceId, NamespaceInfo>>,
}

impl SimulationNamespaceManager {
    pub fn new() -> Self {
        info!("Network namespace manager initialized (simulation mode)");
        Self {
            namespaces: Arc::new(DashMap::new()),
        }
    }
}

impl Default for SimulationNamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceProvider for SimulationNamespaceManager {
    fn create(&self, config: NamespaceConfig) -> NamespaceResult<()> {
        if self.namespaces.contains_key(&config.id) {
            return Err(NamespaceError::AlreadyExists(config.id.to_string()));
        }

        let key = config.id.as_path();
        if let Some(parent) = key.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(key)?;

        info!("Created simulated network namespace: {}", config.id);
        self.namespaces.insert(
            config.id.clone(),
            NamespaceInfo {
                id: config.id,
                interfaces: Vec::new(),
                platform: PlatformType::Simulation,
                created_at: std::time::SystemTime::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &NamespaceId) -> NamespaceResult<()> {
        if self.namespaces.remove(id).is_some() {
            let key = id.as_path();
            if key.exists() {
                fs::remove_file(key)?;
            }
            info!("Destroyed simulated network namespace: {}", id);
        }
        Ok(())
    }

    fn exists(&self, id: &NamespaceId) -> bool {
        self.namespaces.contains_key(id)
    }

    fn get_info(&self, id: &NamespaceId) -> Option<NamespaceInfo> {
        self.namespaces.get(id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<NamespaceInfo> {
        self.namespaces.iter().map(|r| r.value().clone()).collect()
    }

    fn is_supported(&self) -> bool {
        true // Always available as fallback
    }

    fn platform(&self) -> PlatformType {
        PlatformType::Simulation
    }
}

impl InterfaceManager for SimulationNamespaceManager {
    fn add_interface(
        &self,
        ns: &NamespaceId,
        config: &InterfaceConfig,
    ) -> NamespaceResult<String> {
        let mut info = self
            .namespaces
            .get_mut(ns)
            .ok_or_else(|| NamespaceError::NotFound(ns.to_string()))?;

        let name = next_interface_name(
            &config.dst_prefix,
            info.interfaces.iter().map(String::as_str),
        );
        info.interfaces.push(name.clone());

        debug!("Placed {} as {} in simulated {}", config.src_name, name, ns);
        Ok(name)
    }

    fn remove_interface(&self, ns: &NamespaceId, name: &str) -> NamespaceResult<()> {
        let mut info = self
            .namespaces
            .get_mut(ns)
            .ok_or_else(|| NamespaceError::NotFound(ns.to_string()))?;

        let before = info.interfaces.len();
        info.interfaces.retain(|i| i != name);
        if info.interfaces.len() == before {
            return Err(NamespaceError::InterfaceNotFound(name.to_string()));
        }
        Ok(())
    }

    fn statistics(
        &self,
        ns: &NamespaceId,
    ) -> NamespaceResult<HashMap<String, InterfaceStatistics>> {
        let info = self
            .namespaces
            .get(ns)
            .ok_or_else(|| NamespaceError::NotFound(ns.to_string()))?;

        Ok(std::iter::once("lo")
            .chain(info.interfaces.iter().map(String::as_str))
            .map(|name| (name.to_string(), InterfaceStatistics::default()))
            .collect())
    }
}
