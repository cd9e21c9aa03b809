/*!
 * Null Driver
 * Network without connectivity
 */

use super::host::SingleInstance;
use super::traits::Driver;
use super::types::{InterfaceInfo, JoinInfo, NULL};
use crate::core::errors::NetworkResult;
use crate::core::types::Options;

#[derive(Default)]
pub struct NullDriver {
    instance: SingleInstance,
}

impl NullDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for NullDriver {
    fn driver_type(&self) -> &str {
        NULL
    }

    fn config(&self, _options: &Options) -> NetworkResult<()> {
        Ok(())
    }

    fn create_network(&self, network_id: &str, _options: &Options) -> NetworkResult<()> {
        self.instance.claim(NULL, network_id)
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
