/*!
 * Linux Network Namespace Implementation
 * Bind-mounted namespaces programmed over rtnetlink
 */

use super::guard::NamespaceGuard;
use super::netlink::{self, net_err};
use super::stats::parse_net_dev;
use super::traits::*;
use super::types::*;
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info, warn};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sched::{unshare, CloneFlags};
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;
use std::thread;

const THREAD_NETNS: &str = "/proc/thread-self/ns/net";
const THREAD_NET_DEV: &str = "/proc/thread-self/net/dev";

/// Linux network namespace manager
///
/// Every operation that switches namespaces runs on a short-lived dedicated
/// thread so the caller's thread never changes namespace.
#[derive(Clone)]
pub struct LinuxNamespaceManager {
    namespaces: Arc<DashMap<NamespaceId, NamespaceInfo, RandomState>>,
}

impl LinuxNamespaceManager {
    pub fn new() -> Self {
        info!("Linux network namespace manager initialized");
        Self {
            namespaces: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    fn on_pinned_thread<T, F>(name: &str, f: F) -> NamespaceResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> NamespaceResult<T> + Send + 'static,
    {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(f)?
            .join()
            .map_err(|_| NamespaceError::NetworkError(format!("{} thread panicked", name)))?
    }

    fn read_counters() -> NamespaceResult<HashMap<String, InterfaceStatistics>> {
        parse_net_dev(&fs::read_to_string(THREAD_NET_DEV)?)
    }
}

impl Default for LinuxNamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceProvider for LinuxNamespaceManager {
    fn create(&self, config: NamespaceConfig) -> NamespaceResult<()> {
        let key = config.id.to_path_buf();
        if self.namespaces.contains_key(&config.id) {
            return Err(NamespaceError::AlreadyExists(config.id.to_string()));
        }

        if let Some(parent) = key.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(&key)?;

        let target = key.clone();
        let loopback = config.loopback;
        let result = Self::on_pinned_thread("netns-create", move || {
            unshare(CloneFlags::CLONE_NEWNET)
                .map_err(|e| NamespaceError::PermissionDenied(format!("unshare: {}", e)))?;

            mount(
                Some(THREAD_NETNS),
                target.as_path(),
                None::<&str>,
                MsFlags::MS_BIND,
                None::<&str>,
            )
            .map_err(|e| {
                NamespaceError::PermissionDenied(format!("bind mount {}: {}", target.display(), e))
            })?;

            if loopback {
                netlink::run(|handle| async move {
                    let lo = netlink::require_link(&handle, "lo").await?;
                    netlink::set_up(&handle, lo).await
                })?;
            }
            Ok(())
        });

        if let Err(e) = result {
            let _ = umount2(key.as_path(), MntFlags::MNT_DETACH);
            let _ = fs::remove_file(&key);
            return Err(e);
        }

        info!("Created network namespace: {}", config.id);
        self.namespaces.insert(
            config.id.clone(),
            NamespaceInfo {
                id: config.id,
                interfaces: Vec::new(),
                platform: PlatformType::LinuxNetns,
                created_at: std::time::SystemTime::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &NamespaceId) -> NamespaceResult<()> {
        let key = id.as_path();

        if key.exists() {
            if let Err(e) = umount2(key, MntFlags::MNT_DETACH) {
                warn!("Failed to unmount namespace {}: {}", id, e);
            }
            fs::remove_file(key)?;
            info!("Destroyed network namespace: {}", id);
        }

        self.namespaces.remove(id);
        Ok(())
    }

    fn exists(&self, id: &NamespaceId) -> bool {
        self.namespaces.contains_key(id)
    }

    fn get_info(&self, id: &NamespaceId) -> Option<NamespaceInfo> {
        self.namespaces.get(id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<NamespaceInfo> {
        self.namespaces.iter().map(|r| r.value().clone()).collect()
    }

    fn is_supported(&self) -> bool {
        Path::new("/proc/self/ns/net").exists() && nix::unistd::geteuid().is_root()
    }

    fn platform(&self) -> PlatformType {
        PlatformType::LinuxNetns
    }
}

impl InterfaceManager for LinuxNamespaceManager {
    fn add_interface(
        &self,
        ns: &NamespaceId,
        config: &InterfaceConfig,
    ) -> NamespaceResult<String> {
        if !self.exists(ns) {
            return Err(NamespaceError::NotFound(ns.to_string()));
        }

        let key = ns.to_path_buf();
        let cfg = config.clone();
        let name = Self::on_pinned_thread("netns-iface", move || {
            // Host side: make sure the device exists, then hand it to the namespace
            let src = cfg.src_name.clone();
            let ns_file = fs::File::open(&key)?;
            netlink::run(|handle| async move {
                let index = match netlink::link_index(&handle, &src).await {
                    Some(index) => index,
                    None => {
                        let peer: String = format!("{}p", src).chars().take(15).collect();
                        handle
                            .link()
                            .add()
                            .veth(src.clone(), peer.clone())
                            .execute()
                            .await
                            .map_err(|e| net_err(format!("create veth {}<->{}", src, peer), e))?;
                        if let Some(peer_index) = netlink::link_index(&handle, &peer).await {
                            netlink::set_up(&handle, peer_index).await?;
                        }
                        netlink::require_link(&handle, &src).await?
                    }
                };

                handle
                    .link()
                    .set(index)
                    .setns_by_fd(ns_file.as_raw_fd())
                    .execute()
                    .await
                    .map_err(|e| net_err(format!("move {} into namespace", src), e))
            })?;

            // Namespace side
            let _guard = NamespaceGuard::enter(&key)?;
            let existing = Self::read_counters()?;
            let dst = next_interface_name(&cfg.dst_prefix, existing.keys().map(String::as_str));

            let mac = cfg.mac.as_deref().map(netlink::parse_mac).transpose()?;
            let dst_name = dst.clone();
            netlink::run(|handle| async move {
                let index = netlink::require_link(&handle, &cfg.src_name).await?;

                handle
                    .link()
                    .set(index)
                    .name(dst_name.clone())
                    .execute()
                    .await
                    .map_err(|e| net_err(format!("rename {} to {}", cfg.src_name, dst_name), e))?;

                if let Some(mac) = mac {
                    handle
                        .link()
                        .set(index)
                        .address(mac)
                        .execute()
                        .await
                        .map_err(|e| net_err(format!("set MAC on {}", dst_name), e))?;
                }

                if let Some(addr) = cfg.address {
                    handle
                        .address()
                        .add(index, IpAddr::V4(addr.ip()), addr.prefix())
                        .execute()
                        .await
                        .map_err(|e| net_err(format!("add {} to {}", addr, dst_name), e))?;
                }

                if let Some(addr) = cfg.address_v6 {
                    handle
                        .address()
                        .add(index, IpAddr::V6(addr.ip()), addr.prefix())
                        .execute()
                        .await
                        .map_err(|e| net_err(format!("add {} to {}", addr, dst_name), e))?;
                }

                netlink::set_up(&handle, index).await?;

                if let Some(gw) = cfg.gateway {
                    handle
                        .route()
                        .add()
                        .v4()
                        .gateway(gw)
                        .execute()
                        .await
                        .map_err(|e| net_err(format!("default route via {}", gw), e))?;
                }

                if let Some(gw) = cfg.gateway_v6 {
                    handle
                        .route()
                        .add()
                        .v6()
                        .gateway(gw)
                        .execute()
                        .await
                        .map_err(|e| net_err(format!("default route via {}", gw), e))?;
                }

                Ok(())
            })?;

            Ok(dst)
        })?;

        if let Some(mut info) = self.namespaces.get_mut(ns) {
            info.interfaces.push(name.clone());
        }
        debug!("Placed {} as {} in {}", config.src_name, name, ns);
        Ok(name)
    }

    fn remove_interface(&self, ns: &NamespaceId, name: &str) -> NamespaceResult<()> {
        let key = ns.to_path_buf();
        let iface = name.to_string();
        Self::on_pinned_thread("netns-iface", move || {
            let _guard = NamespaceGuard::enter(&key)?;
            netlink::run(|handle| async move {
                let index = netlink::require_link(&handle, &iface).await?;
                handle
                    .link()
                    .del(index)
                    .execute()
                    .await
                    .map_err(|e| net_err(format!("delete {}", iface), e))
            })
        })?;

        if let Some(mut info) = self.namespaces.get_mut(ns) {
            info.interfaces.retain(|i| i != name);
        }
        debug!("Removed {} from {}", name, ns);
        Ok(())
    }

    fn statistics(
        &self,
        ns: &NamespaceId,
    ) -> NamespaceResult<HashMap<String, InterfaceStatistics>> {
        let key = ns.to_path_buf();
        Self::on_pinned_thread("netns-stats", move || {
            let _guard = NamespaceGuard::enter(&key)?;
            Self::read_counters()
        })
    }
}
