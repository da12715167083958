use std::time::Duration;

use crate::config::ResolverConfig;
use crate::metadata::fetchers::{build_client, MetadataFetcher};
use crate::metadata::types::{FetchError, Metadata};

/// Fetch the target page directly and scrape its html
pub struct PlainFetcher {
    user_agent: String,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl PlainFetcher {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

impl MetadataFetcher for PlainFetcher {
    fn fetch(&self, url: &str) -> Result<Option<Metadata>, FetchError> {
        let client = build_client(&self.user_agent, self.timeout, self.accept_invalid_certs)?;

        let resp = client
            .get(url)
            .send()
            .map_err(|err| FetchError::from_reqwest(&err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // relative references resolve against where we ended up, not where we started
        let final_url = resp.url().clone();
        if final_url.as_str() != url {
            log::debug!("{url}: redirected to {final_url}");
        }

        // the server answered, so a broken body is not a reachability problem
        let bytes = resp
            .bytes()
            .map_err(|err| FetchError::Invalid(err.to_string()))?;
        let html = String::from_utf8_lossy(&bytes);

        Ok(Some(crate::scrape::get_data_from_page(&html, &final_url)))
    }

    fn name(&self) -> &'static str {
        "Plain"
    }
}
