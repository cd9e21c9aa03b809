/*!
 * Host Driver
 * Single network sharing the host's stack; endpoints carry no interfaces
 */

use super::traits::Driver;
use super::types::{InterfaceInfo, JoinInfo, HOST};
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::types::Options;
use parking_lot::Mutex;
use tracing::debug;

/// Tracks the one network a single-instance driver may own
#[derive(Default)]
pub(super) struct SingleInstance {
    network: Mutex<Option<String>>,
}

impl SingleInstance {
    pub(super) fn claim(&self, driver_type: &str, network_id: &str) -> NetworkResult<()> {
        let mut network = self.network.lock();
        if network.is_some() {
            return Err(NetworkError::Forbidden(format!(
                "only one instance of \"{}\" network is allowed",
                driver_type
            )));
        }
        *network = Some(network_id.to_string());
        Ok(())
    }

    pub(super) fn release(&self, network_id: &str) {
        let mut network = self.network.lock();
        if network.as_deref() == Some(network_id) {
            *network = None;
        }
    }
}

#[derive(Default)]
pub struct HostDriver {
    instance: SingleInstance,
}

impl HostDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for HostDriver {
    fn driver_type(&self) -> &str {
        HOST
    }

    fn config(&self, _options: &Options) -> NetworkResult<()> {
        Ok(())
    }

    fn create_network(&self, network_id: &str, _options: &Options) -> NetworkResult<()> {
        self.instance.claim(HOST, network_id)?;
        debug!(network_id, "host network created");
        Ok(())
    }

    fn delete_network(&self, network_id: &str) -> NetworkResult<()> {
        self.instance.release(network_id);
        Ok(())
    }

    fn create_endpoint(
        &self,
        _network_id: &str,
        _endpoint_id: &str,
        _options: &Options,
    ) -> NetworkResult<Vec<InterfaceInfo>> {
        Ok(Vec::new())
    }

    fn endpoint_oper_info(&self, _network_id: &str, _endpoint_id: &str) -> NetworkResult<Options> {
        Ok(Options::new())
    }

    fn delete_endpoint(&self, _network_id: &str, _endpoint_id: &str) -> NetworkResult<()> {
        Ok(())
    }

    fn join(
        &self,
        _network_id: &str,
        _endpoint_id: &str,
        _sandbox_key: &str,
        _options: &Options,
    ) -> NetworkResult<JoinInfo> {
        Ok(JoinInfo::default())
    }

    fn leave(&self, _network_id: &str, _endpoint_id: &str) -> NetworkResult<()> {
        Ok(())
    }
}
