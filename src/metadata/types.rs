use serde::{Deserialize, Serialize};

/// Why a single tier produced nothing
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// No HTTP response at all: DNS, connect, TLS or timeout
    #[error("request failed: {0}")]
    Transport(String),

    /// A response arrived but it was not a success
    #[error("unexpected status {0}")]
    Status(u16),

    /// A response arrived but its body could not be used
    #[error("invalid response: {0}")]
    Invalid(String),
}

impl FetchError {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Transport(describe_reqwest_error(err)),
        }
    }
}

/// Innermost cause is the useful bit (e.g. "dns error: failed to lookup address")
fn describe_reqwest_error(error: &reqwest::Error) -> String {
    use std::error::Error;

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message = cause.to_string();
        source = cause.source();
    }
    message
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },
}

/// Metadata as extracted by one tier. Every field is optional until the
/// synthesis tier fills in what is still missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub icon_url: Option<String>,
}

impl Metadata {
    pub fn has_any_data(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.image_url.is_some()
            || self.icon_url.is_some()
    }

    /// Describe which fields are present (for logging)
    pub fn describe_fields(&self) -> String {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.image_url.is_some() {
            fields.push("image_url");
        }
        if self.icon_url.is_some() {
            fields.push("icon_url");
        }
        fields.join(",")
    }
}

/// What a caller gets back for a url. Consumed once by the bookmark form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataResult {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub favicon: Option<String>,
}
