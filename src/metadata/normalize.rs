use url::Url;

/// Validate a user supplied url before any network call.
///
/// The url has to be absolute, use http or https, and carry a host.
pub fn validate_url(url: &str) -> Result<Url, String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("The url field is required.".to_string());
    }

    let parsed = Url::parse(url).map_err(|_| "The url field must be a valid URL.".to_string())?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("The url field must be a valid URL.".to_string());
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err("The url field must be a valid URL.".to_string()),
    }
}

/// Resolve an href found in a document against the document url.
///
/// Uses standard relative-url resolution, so `icon.png` on `/blog/post`
/// becomes `/blog/icon.png` while `/icon.png` stays at the root.
/// Inline `data:` urls are not something we can hand to a client, so they
/// are dropped.
pub fn resolve_relative(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if href
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        log::debug!("inline data urls are not supported");
        return None;
    }

    base.join(href).ok().map(|u| u.to_string())
}

/// Resolve a url that came from a string base (provider responses)
pub fn resolve_against(base: &str, href: &str) -> Option<String> {
    match Url::parse(base) {
        Ok(base) => resolve_relative(&base, href),
        Err(_) => None,
    }
}
