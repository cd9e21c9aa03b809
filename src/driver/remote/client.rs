/*!
 * Plugin Client
 * Blocking HTTP transport for plugin calls
 */

use super::api::{PluginResponse, PLUGIN_CONTENT_TYPE};
use crate::core::errors::{NetworkError, NetworkResult};
use crate::monitoring::CallSpan;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client bound to one plugin
#[derive(Clone)]
pub struct PluginClient {
    name: String,
    base_url: String,
    http: reqwest::blocking::Client,
}

impl PluginClient {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> NetworkResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .user_agent(concat!("ai-os-network/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::NotFound(format!("plugin {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `req` to `<base>/<method>` and decode the reply
    ///
    /// An empty or `null` body decodes to the default response. Transport and
    /// decoding failures are reported as `NotFound`; an `Err` set by the
    /// plugin becomes a driver error.
    pub fn call<Req, Resp>(&self, method: &'static str, req: &Req) -> NetworkResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: PluginResponse + DeserializeOwned,
    {
        let span = CallSpan::new(&self.name, method);
        let _entered = span.enter();

        let result = self.round_trip(method, req);
        span.record_result(result.is_ok());
        result
    }

    fn round_trip<Req, Resp>(&self, method: &str, req: &Req) -> NetworkResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: PluginResponse + DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let body = serde_json::to_vec(req)
            .map_err(|e| NetworkError::BadRequest(format!("encode {}: {}", method, e)))?;

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, PLUGIN_CONTENT_TYPE)
            .header(CONTENT_TYPE, PLUGIN_CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|e| {
                NetworkError::NotFound(format!("plugin {} unreachable at {}: {}", self.name, url, e))
            })?;

        let status = response.status();
        let text = response.text().map_err(|e| {
            NetworkError::NotFound(format!("plugin {} read {}: {}", self.name, method, e))
        })?;
        debug!(plugin = %self.name, method, status = status.as_u16(), "plugin replied");

        let decoded = Self::decode::<Resp>(&text);

        if !status.is_success() {
            if let Ok(resp) = &decoded {
                if !resp.err().is_empty() {
                    return Err(NetworkError::Driver(resp.err().to_string()));
                }
            }
            warn!(plugin = %self.name, method, status = status.as_u16(), "unexpected plugin status");
            return Err(NetworkError::NotFound(format!(
                "plugin {} returned status {} for {}",
                self.name, status, method
            )));
        }

        let resp = decoded.map_err(|e| {
            NetworkError::NotFound(format!("plugin {} sent invalid {} reply: {}", self.name, method, e))
        })?;
        if !resp.err().is_empty() {
            return Err(NetworkError::Driver(resp.err().to_string()));
        }
        Ok(resp)
    }

    fn decode<Resp>(text: &str) -> Result<Resp, serde_json::Error>
    where
        Resp: PluginResponse + DeserializeOwned,
    {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Resp::default());
        }
        serde_json::from_str(trimmed)
    }
}
