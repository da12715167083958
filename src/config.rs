use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Structured extraction provider (microlink-compatible API)
const DEFAULT_PROVIDER_ENDPOINT: &str = "https://api.microlink.io";
/// The provider renders the target page, so it gets the longer budget
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 20;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

pub const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// `{url}` is replaced with the form-urlencoded target url
pub const DEFAULT_SCREENSHOT_TEMPLATE: &str = "https://s0.wp.com/mshots/v1/{url}?w=1200";
/// `{domain}` is replaced with the target host
pub const DEFAULT_FAVICON_TEMPLATE: &str =
    "https://www.google.com/s2/favicons?domain={domain}&sz=64";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,

    /// Sent as `x-api-key`. `MICROLINK_API_KEY` takes precedence when set.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_PROVIDER_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    pub fn effective_api_key(&self) -> Option<String> {
        std::env::var("MICROLINK_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.is_empty()))
    }
}

/// Settings for the url metadata resolver
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Timeout for the direct page fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Target sites are arbitrary and often misconfigured
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_screenshot_template")]
    pub screenshot_template: String,

    #[serde(default = "default_favicon_template")]
    pub favicon_template: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: USER_AGENT_DEFAULT.to_string(),
            accept_invalid_certs: true,
            screenshot_template: DEFAULT_SCREENSHOT_TEMPLATE.to_string(),
            favicon_template: DEFAULT_FAVICON_TEMPLATE.to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_provider_endpoint() -> String {
    DEFAULT_PROVIDER_ENDPOINT.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_screenshot_template() -> String {
    DEFAULT_SCREENSHOT_TEMPLATE.to_string()
}

fn default_favicon_template() -> String {
    DEFAULT_FAVICON_TEMPLATE.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            resolver: ResolverConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            bail!("listen must be a socket address, got '{}'", self.listen);
        }

        let resolver = &self.resolver;
        if resolver.provider.timeout_secs == 0 {
            bail!("resolver.provider.timeout_secs must be greater than 0");
        }
        if resolver.fetch_timeout_secs == 0 {
            bail!("resolver.fetch_timeout_secs must be greater than 0");
        }
        if resolver.provider.enabled && url::Url::parse(&resolver.provider.endpoint).is_err() {
            bail!(
                "resolver.provider.endpoint is not a valid url: '{}'",
                resolver.provider.endpoint
            );
        }
        if !resolver.screenshot_template.contains("{url}") {
            bail!("resolver.screenshot_template must contain '{{url}}'");
        }
        if !resolver.favicon_template.contains("{domain}") {
            bail!("resolver.favicon_template must contain '{{domain}}'");
        }

        Ok(())
    }

    pub fn load_with(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            log::info!("writing default config to {}", config_path.display());
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = self.base_path.join(CONFIG_FILE);
        let temp_path = self.base_path.join(format!("{CONFIG_FILE}-tmp"));

        std::fs::write(&temp_path, serde_yml::to_string(&self)?)?;
        std::fs::rename(&temp_path, &config_path)?;

        Ok(())
    }
}
