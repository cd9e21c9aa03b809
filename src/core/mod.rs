/*!
 * Core Module
 * Shared errors, identifiers, option labels and configuration
 */

pub mod config;
pub mod errors;
pub mod id;
pub mod labels;
pub mod types;

pub use config::{ControllerConfig, NamespaceMode};
pub use errors::{NetworkError, NetworkResult};
pub use types::*;
