/*!
 * Network Namespace Traits
 * Platform-agnostic abstractions for namespace lifecycle and interface placement
 */

use super::types::*;
use std::collections::HashMap;

/// Core namespace management operations
pub trait NamespaceProvider: Send + Sync {
    /// Create a new network namespace bound to its key path
    fn create(&self, config: NamespaceConfig) -> NamespaceResult<()>;

    /// Destroy a network namespace and remove its key file
    fn destroy(&self, id: &NamespaceId) -> NamespaceResult<()>;

    fn exists(&self, id: &NamespaceId) -> bool;

    fn get_info(&self, id: &NamespaceId) -> Option<NamespaceInfo>;

    fn list(&self) -> Vec<NamespaceInfo>;

    /// Check if this implementation is supported on current platform
    fn is_supported(&self) -> bool;

    fn platform(&self) -> PlatformType;
}

/// Interface placement inside namespaces
pub trait InterfaceManager: Send + Sync {
    /// Move an interface into the namespace and configure it
    ///
    /// Returns the name the interface received inside the namespace.
    fn add_interface(&self, ns: &NamespaceId, config: &InterfaceConfig)
        -> NamespaceResult<String>;

    /// Remove an interface previously placed with `add_interface`
    fn remove_interface(&self, ns: &NamespaceId, name: &str) -> NamespaceResult<()>;

    /// Counters of every interface in the namespace, loopback included
    fn statistics(&self, ns: &NamespaceId) -> NamespaceResult<HashMap<String, InterfaceStatistics>>;
}
