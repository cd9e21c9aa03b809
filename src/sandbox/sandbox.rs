/*!
 * Sandbox
 * One container's network namespace, its DNS and hosts files and joined endpoints
 */

use super::hosts::build_hosts;
use super::options::SandboxOptions;
use super::resolvconf::{self, filter_resolv_conf, read_with_mode, write_atomic};
use crate::controller::ControllerInner;
use crate::core::errors::{NetworkError, NetworkResult};
use crate::core::id::{generate_id, short_id};
use crate::core::types::Options;
use crate::driver::{InterfaceInfo, JoinInfo};
use crate::namespace::{
    InterfaceConfig, InterfaceStatistics, NamespaceConfig, NamespaceId, NamespaceManager,
};
use crate::network::Endpoint;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Behaviour shared by every sandbox implementation handed to endpoints
///
/// Only sandboxes created by a [`crate::Controller`] are accepted by
/// `Endpoint::join` and `Endpoint::leave`; anything else is rejected.
pub trait SandboxHandle: Send + Sync {
    fn id(&self) -> &str;
    fn container_id(&self) -> &str;
    /// Path of the namespace key
    fn key(&self) -> &str;
    fn labels(&self) -> &Options;
    fn statistics(&self) -> NetworkResult<HashMap<String, InterfaceStatistics>>;
    fn delete(&self) -> NetworkResult<()>;
    fn as_any(&self) -> &dyn Any;
}

/// Endpoint attached to the sandbox and what it placed there
struct AttachedEndpoint {
    endpoint: Endpoint,
    interfaces: Vec<String>,
    provides_gateway: bool,
    ipv6: bool,
}

/// What the sandbox last did to its local resolv.conf
#[derive(Default)]
struct DnsState {
    /// Host content the local file was generated from
    snapshot: Option<String>,
    /// Content last written to the local file
    applied: Option<String>,
    ipv6: bool,
}

#[derive(Default)]
struct SandboxState {
    endpoints: Vec<AttachedEndpoint>,
    deleting: bool,
    deleted: bool,
    hosts_built: bool,
    /// Whether the hosts file carries the sandbox's own address
    hosts_addressed: bool,
    dns: DnsState,
}

pub(crate) struct SandboxInner {
    id: String,
    container_id: String,
    key: String,
    options: SandboxOptions,
    hosts_path: PathBuf,
    resolv_conf_path: PathBuf,
    /// Per-sandbox directory holding default files, removed on delete
    files_dir: PathBuf,
    host_resolv_conf: PathBuf,
    namespaces: NamespaceManager,
    controller: Weak<ControllerInner>,
    controller_id: String,
    state: Mutex<SandboxState>,
}

/// Handle to a sandbox; clones share state
#[derive(Clone)]
pub struct Sandbox(Arc<SandboxInner>);

impl Sandbox {
    /// Allocate the namespace and register nothing yet
    pub(crate) fn create(
        controller: &Arc<ControllerInner>,
        container_id: &str,
        options: SandboxOptions,
    ) -> NetworkResult<Self> {
        let config = &controller.config;
        let id = generate_id();
        let files_dir = config.files_root.join(&id);

        let key = if options.use_default_sandbox {
            controller.default_namespace()?
        } else {
            let key = config.netns_root.join(short_id(&id));
            controller
                .namespaces
                .create(NamespaceConfig::new(NamespaceId::from_path(&key)))?;
            key
        };

        let hosts_path = options
            .hosts_path
            .clone()
            .unwrap_or_else(|| files_dir.join("hosts"));
        let resolv_conf_path = options
            .resolv_conf_path
            .clone()
            .unwrap_or_else(|| files_dir.join("resolv.conf"));

        info!(
            sandbox_id = %id,
            container_id,
            key = %key.display(),
            "sandbox created"
        );

        Ok(Self(Arc::new(SandboxInner {
            id,
            container_id: container_id.to_string(),
            key: key.to_string_lossy().into_owned(),
            options,
            hosts_path,
            resolv_conf_path,
            files_dir,
            host_resolv_conf: config.host_resolv_conf.clone(),
            namespaces: controller.namespaces.clone(),
            controller: Arc::downgrade(controller),
            controller_id: controller.id.clone(),
            state: Mutex::new(SandboxState::default()),
        })))
    }

    pub(crate) fn from_inner(inner: Arc<SandboxInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<SandboxInner> {
        Arc::downgrade(&self.0)
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn container_id(&self) -> &str {
        &self.0.container_id
    }

    pub fn key(&self) -> &str {
        &self.0.key
    }

    pub fn labels(&self) -> &Options {
        &self.0.options.labels
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.0.options
    }

    pub fn hosts_path(&self) -> &Path {
        &self.0.hosts_path
    }

    pub fn resolv_conf_path(&self) -> &Path {
        &self.0.resolv_conf_path
    }

    /// True when the sandbox lives in the controller's shared namespace
    pub fn is_default(&self) -> bool {
        self.0.options.use_default_sandbox
    }

    /// IDs of the endpoints currently joined, in join order
    pub fn endpoint_ids(&self) -> Vec<String> {
        self.0
            .state
            .lock()
            .endpoints
            .iter()
            .map(|a| a.endpoint.id().to_string())
            .collect()
    }

    pub(crate) fn controller_id(&self) -> &str {
        &self.0.controller_id
    }

    fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(self.0.key.clone())
    }

    /// Per-interface counters, loopback included
    pub fn statistics(&self) -> NetworkResult<HashMap<String, InterfaceStatistics>> {
        Ok(self.0.namespaces.statistics(&self.namespace_id())?)
    }

    /// Place the interfaces of a joining endpoint and refresh hosts and DNS
    ///
    /// Called with the endpoint lock held. On failure nothing stays placed.
    pub(crate) fn attach_endpoint(
        &self,
        endpoint: &Endpoint,
        interfaces: &[InterfaceInfo],
        join: &JoinInfo,
        ipv6: bool,
    ) -> NetworkResult<()> {
        let mut state = self.0.state.lock();
        if state.deleting || state.deleted {
            return Err(NetworkError::Forbidden(format!(
                "sandbox {} is being deleted",
                self.0.id
            )));
        }

        let ns = self.namespace_id();
        let set_gateway = !state.endpoints.iter().any(|a| a.provides_gateway);
        let mut placed = Vec::with_capacity(join.interface_names.len());

        for (i, name) in join.interface_names.iter().enumerate() {
            let info = interfaces.get(i);
            let config = InterfaceConfig {
                src_name: name.src_name.clone(),
                dst_prefix: name.dst_prefix.clone(),
                address: info.and_then(|i| i.address),
                address_v6: info.and_then(|i| i.address_v6),
                mac: info.and_then(|i| i.mac_address.clone()),
                gateway: join.gateway.filter(|_| set_gateway && i == 0),
                gateway_v6: join.gateway_v6.filter(|_| set_gateway && i == 0),
            };

            match self.0.namespaces.add_interface(&ns, &config) {
                Ok(dst) => placed.push(dst),
                Err(e) => {
                    self.remove_interfaces(&ns, &placed);
                    return Err(e.into());
                }
            }
        }

        let provides_gateway =
            set_gateway && (join.gateway.is_some() || join.gateway_v6.is_some());
        state.endpoints.push(AttachedEndpoint {
            endpoint: endpoint.clone(),
            interfaces: placed,
            provides_gateway,
            ipv6,
        });

        let address = interfaces.first().and_then(|i| i.address).map(|a| a.ip());
        let files = self.refresh_files(&mut state, address);
        if let Err(e) = files {
            if let Some(attached) = state.endpoints.pop() {
                self.remove_interfaces(&ns, &attached.interfaces);
            }
            return Err(e);
        }

        debug!(sandbox_id = %self.0.id, endpoint_id = endpoint.id(), "endpoint attached");
        Ok(())
    }

    /// Remove the interfaces of a leaving endpoint and re-run the DNS check
    ///
    /// Called with the endpoint lock held.
    pub(crate) fn detach_endpoint(&self, endpoint_id: &str) {
        let mut state = self.0.state.lock();
        let Some(pos) = state
            .endpoints
            .iter()
            .position(|a| a.endpoint.id() == endpoint_id)
        else {
            return;
        };

        let attached = state.endpoints.remove(pos);
        self.remove_interfaces(&self.namespace_id(), &attached.interfaces);

        if !state.deleting {
            let ipv6 = state.endpoints.iter().any(|a| a.ipv6);
            if let Err(e) = self.update_dns(&mut state.dns, ipv6) {
                warn!(sandbox_id = %self.0.id, error = %e, "DNS update after leave failed");
            }
        }
        debug!(sandbox_id = %self.0.id, endpoint_id, "endpoint detached");
    }

    fn remove_interfaces(&self, ns: &NamespaceId, names: &[String]) {
        for name in names {
            if let Err(e) = self.0.namespaces.remove_interface(ns, name) {
                warn!(sandbox_id = %self.0.id, interface = %name, error = %e, "interface removal failed");
            }
        }
    }

    fn refresh_files(
        &self,
        state: &mut SandboxState,
        address: Option<std::net::Ipv4Addr>,
    ) -> NetworkResult<()> {
        // Interfaceless joins leave the address out until an addressed endpoint arrives
        let needs_address = !state.hosts_addressed && address.is_some();
        if !state.hosts_built || needs_address {
            let opts = &self.0.options;
            let content = build_hosts(
                address,
                opts.hostname.as_deref(),
                opts.domainname.as_deref(),
                &opts.extra_hosts,
            );
            write_atomic(&self.0.hosts_path, content.as_bytes(), resolvconf::DEFAULT_MODE)?;
            state.hosts_built = true;
            state.hosts_addressed = address.is_some();
        }

        let ipv6 = state.endpoints.iter().any(|a| a.ipv6);
        self.update_dns(&mut state.dns, ipv6)
    }

    /// Bring the local resolv.conf in line with its source
    fn update_dns(&self, dns: &mut DnsState, ipv6: bool) -> NetworkResult<()> {
        let local = &self.0.resolv_conf_path;

        if let Some(origin) = &self.0.options.origin_resolv_conf_path {
            let (content, mode) = read_with_mode(origin)?;
            write_atomic(local, &content, mode)?;
            dns.applied = Some(String::from_utf8_lossy(&content).into_owned());
            return Ok(());
        }

        if let Some(applied) = &dns.applied {
            if let Ok(current) = fs::read_to_string(local) {
                if &current != applied {
                    debug!(path = %local.display(), "resolv.conf edited locally, leaving it alone");
                    return Ok(());
                }
            }
        }

        let (source, mode) = match read_with_mode(&self.0.host_resolv_conf) {
            Ok((bytes, mode)) => (String::from_utf8_lossy(&bytes).into_owned(), mode),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (String::new(), resolvconf::DEFAULT_MODE),
            Err(e) => return Err(e.into()),
        };

        let unchanged = dns.applied.is_some()
            && dns.snapshot.as_deref() == Some(source.as_str())
            && dns.ipv6 == ipv6;
        if unchanged {
            return Ok(());
        }

        let filtered = filter_resolv_conf(&source, ipv6);
        write_atomic(local, filtered.as_bytes(), mode)?;
        debug!(sandbox_id = %self.0.id, path = %local.display(), ipv6, "resolv.conf regenerated");

        dns.snapshot = Some(source);
        dns.applied = Some(filtered);
        dns.ipv6 = ipv6;
        Ok(())
    }

    /// Leave every joined endpoint, destroy the namespace and unregister
    pub fn delete(&self) -> NetworkResult<()> {
        let endpoints: Vec<Endpoint> = {
            let mut state = self.0.state.lock();
            if state.deleted {
                return Ok(());
            }
            state.deleting = true;
            state.endpoints.iter().map(|a| a.endpoint.clone()).collect()
        };

        for ep in endpoints {
            match ep.leave(Some(self as &dyn SandboxHandle)) {
                Ok(()) => {}
                Err(NetworkError::Forbidden(reason)) => {
                    debug!(sandbox_id = %self.0.id, endpoint_id = ep.id(), %reason, "endpoint already left");
                }
                Err(e) => {
                    warn!(sandbox_id = %self.0.id, endpoint_id = ep.id(), error = %e, "leave during sandbox delete failed");
                }
            }
        }

        if !self.is_default() {
            self.0.namespaces.destroy(&self.namespace_id())?;
        }

        if self.0.files_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.0.files_dir) {
                warn!(sandbox_id = %self.0.id, error = %e, "failed to remove sandbox files");
            }
        }

        self.0.state.lock().deleted = true;
        if let Some(controller) = self.0.controller.upgrade() {
            controller.remove_sandbox(&self.0.id);
        }

        info!(sandbox_id = %self.0.id, container_id = %self.0.container_id, "sandbox deleted");
        Ok(())
    }
}

impl SandboxHandle for Sandbox {
    fn id(&self) -> &str {
        Sandbox::id(self)
    }

    fn container_id(&self) -> &str {
        Sandbox::container_id(self)
    }

    fn key(&self) -> &str {
        Sandbox::key(self)
    }

    fn labels(&self) -> &Options {
        Sandbox::labels(self)
    }

    fn statistics(&self) -> NetworkResult<HashMap<String, InterfaceStatistics>> {
        Sandbox::statistics(self)
    }

    fn delete(&self) -> NetworkResult<()> {
        Sandbox::delete(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PartialEq for Sandbox {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Sandbox {}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.0.id)
            .field("container_id", &self.0.container_id)
            .field("key", &self.0.key)
            .finish()
    }
}
