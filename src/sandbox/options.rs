/*!
 * Sandbox Options
 */

use super::hosts::HostRecord;
use crate::core::types::Options;
use serde_json::Value;
use std::path::PathBuf;

/// Options accepted by `Controller::new_sandbox`
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub extra_hosts: Vec<HostRecord>,
    /// Local hosts file; defaults to a per-sandbox file under the files root
    pub hosts_path: Option<PathBuf>,
    /// Local resolv.conf; defaults to a per-sandbox file under the files root
    pub resolv_conf_path: Option<PathBuf>,
    /// File copied verbatim to the local resolv.conf instead of the host one
    pub origin_resolv_conf_path: Option<PathBuf>,
    pub labels: Options,
    /// Join the shared default namespace instead of allocating one
    pub use_default_sandbox: bool,
}

impl SandboxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_domainname(mut self, domainname: impl Into<String>) -> Self {
        self.domainname = Some(domainname.into());
        self
    }

    pub fn with_extra_host(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.extra_hosts.push(HostRecord {
            name: name.into(),
            address: address.into(),
        });
        self
    }

    pub fn with_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_path = Some(path.into());
        self
    }

    pub fn with_resolv_conf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf_path = Some(path.into());
        self
    }

    pub fn with_origin_resolv_conf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.origin_resolv_conf_path = Some(path.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: Value) -> Self {
        self.labels.insert(key.into(), value);
        self
    }

    pub fn with_default_sandbox(mut self) -> Self {
        self.use_default_sandbox = true;
        self
    }
}
