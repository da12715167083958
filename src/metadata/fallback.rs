use url::{form_urlencoded, Url};

use crate::config::ResolverConfig;

/// Placeholder assets used when no tier found a real image or favicon.
///
/// Both are pure template substitutions, so the same url always yields the
/// same placeholder.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    screenshot_template: String,
    favicon_template: String,
}

impl Synthesizer {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            screenshot_template: config.screenshot_template.clone(),
            favicon_template: config.favicon_template.clone(),
        }
    }

    /// Screenshot-rendering service url for the target page
    pub fn image_url(&self, target: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        self.screenshot_template.replace("{url}", &encoded)
    }

    /// Favicon-lookup service url for the target's domain
    pub fn favicon_url(&self, target: &str) -> Option<String> {
        let parsed = Url::parse(target).ok()?;
        let host = parsed.host_str()?;
        Some(self.favicon_template.replace("{domain}", host))
    }
}
