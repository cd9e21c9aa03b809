/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::namespace::NamespaceError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for network core operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors surfaced by the controller, networks, endpoints, sandboxes and drivers
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum NetworkError {
    #[error("invalid name: {0:?}")]
    #[diagnostic(
        code(network::invalid_name),
        help("Names must be non-empty strings.")
    )]
    InvalidName(String),

    #[error("invalid id: {0:?}")]
    #[diagnostic(code(network::invalid_id), help("Identifiers must be non-empty strings."))]
    InvalidId(String),

    #[error("not found: {0}")]
    #[diagnostic(
        code(network::driver_not_found),
        help("Register the driver locally or install a plugin spec file for it.")
    )]
    NotFound(String),

    #[error("no network with {0}")]
    #[diagnostic(code(network::no_such_network))]
    NoSuchNetwork(String),

    #[error("no endpoint with {0}")]
    #[diagnostic(code(network::no_such_endpoint))]
    NoSuchEndpoint(String),

    #[error("no sandbox with {0}")]
    #[diagnostic(code(network::no_such_sandbox))]
    NoSuchSandbox(String),

    #[error("network with name {0} already exists")]
    #[diagnostic(
        code(network::name_conflict),
        help("Network names are unique per controller. Delete the existing network or pick another name.")
    )]
    NetworkNameConflict(String),

    #[error("forbidden: {0}")]
    #[diagnostic(code(network::forbidden))]
    Forbidden(String),

    #[error("bad request: {0}")]
    #[diagnostic(code(network::bad_request))]
    BadRequest(String),

    #[error("network {name} has {count} active endpoints")]
    #[diagnostic(
        code(network::active_endpoints),
        help("Delete every endpoint of the network before deleting the network.")
    )]
    ActiveEndpoints { name: String, id: String, count: usize },

    #[error("endpoint {name} has an active container")]
    #[diagnostic(
        code(network::active_container),
        help("Leave the sandbox before deleting the endpoint.")
    )]
    ActiveContainer { name: String, id: String },

    #[error("unknown network {name} id {id}")]
    #[diagnostic(code(network::unknown_network), help("The network was already deleted."))]
    UnknownNetwork { name: String, id: String },

    #[error("plugin {plugin} does not implement the requested driver (implements {implements:?})")]
    #[diagnostic(code(network::plugin_not_implements))]
    NotImplements {
        plugin: String,
        implements: Vec<String>,
    },

    #[error("driver error: {0}")]
    #[diagnostic(code(network::driver))]
    Driver(String),

    #[error("namespace error: {0}")]
    #[diagnostic(code(network::namespace))]
    Namespace(#[from] NamespaceError),

    #[error("IO error: {0}")]
    #[diagnostic(code(network::io))]
    Io(String),

    #[error("store error: {0}")]
    #[diagnostic(code(network::store))]
    Store(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Store(err.to_string())
    }
}

impl NetworkError {
    /// True for every error that means "the requested driver cannot be used"
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetworkError::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, NetworkError::Forbidden(_))
    }
}
