/*!
 * Network Namespace Module
 * Namespace lifecycle and interface placement with platform-specific implementations
 */

#[cfg(target_os = "linux")]
mod guard;
#[cfg(target_os = "linux")]
mod linux;
mod manager;
#[cfg(target_os = "linux")]
mod netlink;
mod simulation;
mod stats;
mod traits;
mod types;

#[cfg(target_os = "linux")]
pub use guard::NamespaceGuard;
pub use manager::NamespaceManager;
pub use stats::parse_net_dev;
pub use traits::*;
pub use types::*;
