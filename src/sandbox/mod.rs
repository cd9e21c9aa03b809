/*!
 * Sandbox Module
 * Per-container namespaces with their hosts and DNS files
 */

mod hosts;
mod options;
pub mod resolvconf;
#[allow(clippy::module_inception)]
mod sandbox;

pub use hosts::{build_hosts, HostRecord};
pub use options::SandboxOptions;
pub(crate) use sandbox::SandboxInner;
pub use sandbox::{Sandbox, SandboxHandle};
