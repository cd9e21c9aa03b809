/*!
 * Controller Configuration
 *
 * Filesystem roots, plugin discovery and namespace provider selection
 */

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the namespace key directory
pub const ENV_NETNS_ROOT: &str = "AIOS_NET_NETNS_ROOT";
/// Environment variable overriding the per-sandbox file directory
pub const ENV_FILES_ROOT: &str = "AIOS_NET_FILES_ROOT";
/// Environment variable overriding the host resolv.conf path
pub const ENV_RESOLV_CONF: &str = "AIOS_NET_RESOLV_CONF";
/// Colon separated list of plugin spec directories
pub const ENV_PLUGIN_DIRS: &str = "AIOS_NET_PLUGIN_DIRS";
/// Remote plugin call timeout in milliseconds
pub const ENV_PLUGIN_TIMEOUT_MS: &str = "AIOS_NET_PLUGIN_TIMEOUT_MS";
/// Forces the in-memory namespace provider when set to 1 or true
pub const ENV_SIMULATION: &str = "AIOS_NET_SIMULATION";

/// Namespace provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespaceMode {
    /// Real namespaces when the platform and privileges allow it
    #[default]
    Auto,
    /// In-memory namespaces, nothing touches the host network stack
    Simulation,
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory holding one bind-mounted key file per sandbox namespace
    pub netns_root: PathBuf,
    /// Directory holding the default per-sandbox hosts and resolv.conf files
    pub files_root: PathBuf,
    /// Host resolv.conf used as the DNS source for sandboxes
    pub host_resolv_conf: PathBuf,
    /// Directories searched for `<type>.spec` and `<type>.json` plugin files
    pub plugin_dirs: Vec<PathBuf>,
    /// Timeout applied to every remote plugin request
    pub plugin_timeout: Duration,
    pub namespace_mode: NamespaceMode,
    /// Create the `host` and `none` networks on startup
    pub builtin_networks: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            netns_root: PathBuf::from("/var/run/ai-os/netns"),
            files_root: PathBuf::from("/var/lib/ai-os/network/files"),
            host_resolv_conf: PathBuf::from("/etc/resolv.conf"),
            plugin_dirs: vec![
                PathBuf::from("/etc/ai-os/plugins"),
                PathBuf::from("/usr/lib/ai-os/plugins"),
            ],
            plugin_timeout: Duration::from_secs(10),
            namespace_mode: NamespaceMode::Auto,
            builtin_networks: true,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by the `AIOS_NET_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var(ENV_NETNS_ROOT) {
            config.netns_root = PathBuf::from(root);
        }
        if let Ok(root) = env::var(ENV_FILES_ROOT) {
            config.files_root = PathBuf::from(root);
        }
        if let Ok(path) = env::var(ENV_RESOLV_CONF) {
            config.host_resolv_conf = PathBuf::from(path);
        }
        if let Ok(dirs) = env::var(ENV_PLUGIN_DIRS) {
            config.plugin_dirs = env::split_paths(&dirs).collect();
        }
        if let Some(ms) = env::var(ENV_PLUGIN_TIMEOUT_MS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.plugin_timeout = Duration::from_millis(ms);
        }
        if env::var(ENV_SIMULATION)
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false)
        {
            config.namespace_mode = NamespaceMode::Simulation;
        }

        config
    }

    /// Self-contained configuration rooted at `root`, using simulated namespaces
    ///
    /// The host resolv.conf path points inside `root` too, so callers can seed it.
    pub fn isolated(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            netns_root: root.join("netns"),
            files_root: root.join("files"),
            host_resolv_conf: root.join("resolv.conf"),
            plugin_dirs: vec![root.join("plugins")],
            plugin_timeout: Duration::from_secs(5),
            namespace_mode: NamespaceMode::Simulation,
            builtin_networks: true,
        }
    }

    pub fn with_netns_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.netns_root = path.into();
        self
    }

    pub fn with_files_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.files_root = path.into();
        self
    }

    pub fn with_host_resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_resolv_conf = path.into();
        self
    }

    pub fn with_plugin_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.plugin_dirs = dirs;
        self
    }

    pub fn with_plugin_timeout(mut self, timeout: Duration) -> Self {
        self.plugin_timeout = timeout;
        self
    }

    pub fn with_namespace_mode(mut self, mode: NamespaceMode) -> Self {
        self.namespace_mode = mode;
        self
    }

    pub fn with_builtin_networks(mut self, enabled: bool) -> Self {
        self.builtin_networks = enabled;
        self
    }

    /// Path of the shared namespace used by sandboxes that opt into it
    pub fn default_sandbox_key(&self) -> PathBuf {
        self.netns_root.join("default")
    }
}
