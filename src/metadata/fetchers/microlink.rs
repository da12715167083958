use std::time::Duration;

use serde_json::Value;

use crate::config::ResolverConfig;
use crate::metadata::fetchers::{build_client, MetadataFetcher};
use crate::metadata::types::{FetchError, Metadata};

/// Structured extraction provider. It renders the target page on its side
/// and returns cleaned metadata plus a screenshot.
pub struct MicrolinkFetcher {
    endpoint: String,
    api_key: Option<String>,
    user_agent: String,
    timeout: Duration,
}

impl MicrolinkFetcher {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            endpoint: config.provider.endpoint.clone(),
            api_key: config.provider.effective_api_key(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.provider.timeout_secs),
        }
    }

    fn microlink(&self, url: &str) -> Result<Value, FetchError> {
        let client = build_client(&self.user_agent, self.timeout, false)?;

        let mut req = client
            .get(&self.endpoint)
            .query(&[("url", url), ("screenshot", "true"), ("meta", "true")]);

        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().map_err(|err| FetchError::from_reqwest(&err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.json::<Value>()
            .map_err(|err| FetchError::Invalid(err.to_string()))
    }

    /// Pull the fields we care about out of a provider response.
    /// Returns None unless the response carries at least one useful field.
    pub fn extract_microlink_metadata(resp: &Value) -> Option<Metadata> {
        if let Some(status) = resp.get("status").and_then(|v| v.as_str()) {
            if status != "success" {
                let message = resp
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                log::warn!("microlink error: status={status} message={message}");
                return None;
            }
        }

        let data = resp.get("data")?;

        let text = |key: &str| {
            data.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let nested_url = |key: &str| {
            data.get(key)
                .and_then(|v| v.get("url"))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let meta = Metadata {
            title: text("title"),
            description: text("description"),
            image_url: nested_url("image").or_else(|| nested_url("screenshot")),
            icon_url: nested_url("logo").or_else(|| nested_url("favicon")),
        };

        if meta.has_any_data() {
            Some(meta)
        } else {
            None
        }
    }
}

impl MetadataFetcher for MicrolinkFetcher {
    fn fetch(&self, url: &str) -> Result<Option<Metadata>, FetchError> {
        if self.api_key.is_none() {
            log::debug!("no provider api key; using public API (rate/feature limits may apply)");
        }

        let resp = self.microlink(url)?;
        Ok(Self::extract_microlink_metadata(&resp))
    }

    fn name(&self) -> &'static str {
        "Microlink"
    }
}
