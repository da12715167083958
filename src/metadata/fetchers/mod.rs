pub mod microlink;
pub mod plain;

use std::time::Duration;

use crate::metadata::types::{FetchError, Metadata};

/// One tier of the resolver
pub trait MetadataFetcher: Send + Sync {
    /// Attempt to fetch metadata for a url.
    /// Returns Ok(None) when this fetcher has nothing useful to offer.
    fn fetch(&self, url: &str) -> Result<Option<Metadata>, FetchError>;

    /// Get the name of this fetcher for logging/debugging
    fn name(&self) -> &'static str;
}

pub(crate) fn build_client(
    user_agent: &str,
    timeout: Duration,
    accept_invalid_certs: bool,
) -> Result<reqwest::blocking::Client, FetchError> {
    reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .danger_accept_invalid_hostnames(accept_invalid_certs)
        .timeout(timeout)
        .pool_idle_timeout(timeout)
        .build()
        .map_err(|err| FetchError::Transport(err.to_string()))
}

/// Run a fetcher and log the outcome the same way for every tier
pub(crate) fn run_logged(
    fetcher: &dyn MetadataFetcher,
    url: &str,
) -> Result<Option<Metadata>, FetchError> {
    let name = fetcher.name();
    let started = std::time::Instant::now();
    let result = fetcher.fetch(url);
    let elapsed_ms = started.elapsed().as_millis();

    match &result {
        Ok(Some(m)) => {
            let fields = m.describe_fields();
            log::info!("fetcher={name} outcome=success fields=[{fields}] took={elapsed_ms}ms");
        }
        Ok(None) => log::info!("fetcher={name} outcome=skip took={elapsed_ms}ms"),
        Err(err) => log::warn!("fetcher={name} outcome=error err={err} took={elapsed_ms}ms"),
    }

    result
}
