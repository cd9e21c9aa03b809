/*!
 * Controller Module
 */

#[allow(clippy::module_inception)]
mod controller;

pub use controller::{Controller, HOST_NETWORK, NONE_NETWORK};
pub(crate) use controller::ControllerInner;
