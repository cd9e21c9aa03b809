/*!
 * Plugin Discovery
 * Resolves a plugin name to its base URL from spec files
 */

use crate::core::errors::{NetworkError, NetworkResult};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Location of a discovered plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub url: String,
}

#[derive(Deserialize)]
struct JsonSpec {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Addr")]
    addr: String,
}

/// Searches plugin directories for `<name>.spec` and `<name>.json`
#[derive(Debug, Clone, Default)]
pub struct PluginDiscovery {
    dirs: Vec<PathBuf>,
}

impl PluginDiscovery {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn lookup(&self, name: &str) -> NetworkResult<PluginSpec> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(NetworkError::NotFound(format!("invalid plugin name {:?}", name)));
        }

        for dir in &self.dirs {
            let spec_path = dir.join(format!("{}.spec", name));
            if let Ok(content) = fs::read_to_string(&spec_path) {
                debug!(plugin = name, path = %spec_path.display(), "found plugin spec");
                return Ok(PluginSpec {
                    name: name.to_string(),
                    url: normalize_url(content.trim())?,
                });
            }

            let json_path = dir.join(format!("{}.json", name));
            if let Ok(content) = fs::read_to_string(&json_path) {
                debug!(plugin = name, path = %json_path.display(), "found plugin json spec");
                let spec: JsonSpec = serde_json::from_str(&content).map_err(|e| {
                    NetworkError::NotFound(format!("invalid plugin spec {}: {}", json_path.display(), e))
                })?;
                let plugin_name = if spec.name.is_empty() {
                    name.to_string()
                } else {
                    spec.name
                };
                return Ok(PluginSpec {
                    name: plugin_name,
                    url: normalize_url(spec.addr.trim())?,
                });
            }
        }

        Err(NetworkError::NotFound(format!("plugin {} not found", name)))
    }
}

/// Map a spec address to an HTTP base URL
fn normalize_url(addr: &str) -> NetworkResult<String> {
    if let Some(rest) = addr.strip_prefix("tcp://") {
        return Ok(format!("http://{}", rest));
    }
    if addr.starts_with("http://") || addr.starts_with("https://") {
        return Ok(addr.to_string());
    }
    Err(NetworkError::NotFound(format!(
        "unsupported plugin address {:?}",
        addr
    )))
}
