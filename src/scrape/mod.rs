use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::metadata::normalize::resolve_relative;
use crate::metadata::Metadata;

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta").expect("valid meta selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[href]").expect("valid link selector"));

const DESCRIPTION_KEYS: [&str; 3] = ["description", "og:description", "twitter:description"];
const IMAGE_KEYS: [&str; 2] = ["og:image", "twitter:image"];
const TITLE_KEYS: [&str; 2] = ["og:title", "twitter:title"];

/// Extract page metadata from raw html.
///
/// Parsing never fails: html5ever recovers from malformed markup the way a
/// browser would. `base` is the final document url (after redirects) and is
/// used to resolve relative image and favicon references.
pub fn get_data_from_page(html: &str, base: &Url) -> Metadata {
    let document = Html::parse_document(html);

    // first non-empty value per key, keyed by `name` or `property`
    let mut meta: HashMap<String, String> = HashMap::new();
    for element in document.select(&META_SELECTOR) {
        let meta_key = element
            .attr("name")
            .or_else(|| element.attr("property"))
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let meta_value = element.attr("content").unwrap_or_default().trim();

        if meta_key.is_empty() || meta_value.is_empty() {
            continue;
        }

        meta.entry(meta_key).or_insert_with(|| meta_value.to_string());
    }

    let first_of = |keys: &[&str]| keys.iter().find_map(|key| meta.get(*key).cloned());

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .or_else(|| first_of(&TITLE_KEYS));

    let description = first_of(&DESCRIPTION_KEYS);

    let image_url = first_of(&IMAGE_KEYS).and_then(|image| resolve_relative(base, &image));

    let icon_url = document
        .select(&LINK_SELECTOR)
        .filter(|element| is_icon_rel(element.attr("rel").unwrap_or_default()))
        .filter_map(|element| element.attr("href"))
        .find_map(|href| resolve_relative(base, href));

    Metadata {
        title,
        description,
        image_url,
        icon_url,
    }
}

/// `rel` is a set of space separated tokens, so `icon` and `shortcut icon`
/// qualify while `apple-touch-icon` does not.
fn is_icon_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("icon"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    fn html_with_head(head: &str) -> String {
        format!(r#"<html><head>{head}</head><body></body></html>"#)
    }

    #[test]
    fn test_title_tag() {
        let html = html_with_head("<title>  Example\n</title>");
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.title.as_deref(), Some("Example"));
    }

    #[test]
    fn test_title_entities_are_decoded() {
        let html = html_with_head("<title>Tom &amp; Jerry &#8211; Home</title>");
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.title.as_deref(), Some("Tom & Jerry \u{2013} Home"));
    }

    #[test]
    fn test_og_title_used_when_title_tag_missing() {
        let html = html_with_head(r#"<meta property="og:title" content="OG Title">"#);
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn test_title_tag_preferred_over_og_title() {
        let html = html_with_head(
            r#"<meta property="og:title" content="OG Title"><title>HTML Title</title>"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.title.as_deref(), Some("HTML Title"));
    }

    #[test]
    fn test_description_precedence() {
        let html = html_with_head(
            r#"<meta name="twitter:description" content="Twitter">
               <meta property="og:description" content="OG">
               <meta name="description" content="Plain">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.description.as_deref(), Some("Plain"));

        let html = html_with_head(
            r#"<meta name="twitter:description" content="Twitter">
               <meta property="og:description" content="OG">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.description.as_deref(), Some("OG"));

        let html = html_with_head(r#"<meta name="twitter:description" content="Twitter">"#);
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.description.as_deref(), Some("Twitter"));
    }

    #[test]
    fn test_empty_description_is_skipped() {
        let html = html_with_head(
            r#"<meta name="description" content="  ">
               <meta property="og:description" content="Desc">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.description.as_deref(), Some("Desc"));
    }

    #[test]
    fn test_image_precedence_and_resolution() {
        let html = html_with_head(
            r#"<meta name="twitter:image" content="https://cdn.example.com/tw.png">
               <meta property="og:image" content="/images/og.png">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.image_url.as_deref(), Some("https://example.com/images/og.png"));

        let html =
            html_with_head(r#"<meta name="twitter:image" content="https://cdn.example.com/tw.png">"#);
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.image_url.as_deref(), Some("https://cdn.example.com/tw.png"));
    }

    #[test]
    fn test_icon_rel_before_href() {
        let html = html_with_head(r#"<link rel="icon" href="/favicon.ico">"#);
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.icon_url.as_deref(), Some("https://example.com/favicon.ico"));
    }

    #[test]
    fn test_shortcut_icon_href_before_rel() {
        let html = html_with_head(r#"<link href="https://static.example.com/i.png" rel="shortcut icon">"#);
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.icon_url.as_deref(), Some("https://static.example.com/i.png"));
    }

    #[test]
    fn test_apple_touch_icon_is_ignored() {
        let html = html_with_head(
            r#"<link rel="apple-touch-icon" href="/touch.png">
               <link rel="stylesheet" href="/site.css">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.icon_url, None);
    }

    #[test]
    fn test_data_icon_falls_through_to_next_candidate() {
        let html = html_with_head(
            r#"<link rel="icon" href="data:image/png;base64,AAAA">
               <link rel="icon" href="icon.png">"#,
        );
        let m = get_data_from_page(&html, &base());
        assert_eq!(m.icon_url.as_deref(), Some("https://example.com/blog/icon.png"));
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = r#"<html><head><title>Broken<meta name="description" content="still here"
            <link rel=icon href=/f.ico></head><body><div><p>unclosed"#;
        let m = get_data_from_page(html, &base());
        assert!(m.title.is_some());
    }

    #[test]
    fn test_meta_outside_head() {
        let html = r#"<title>T</title><body><meta property="og:description" content="Desc"></body>"#;
        let m = get_data_from_page(html, &base());
        assert_eq!(m.title.as_deref(), Some("T"));
        assert_eq!(m.description.as_deref(), Some("Desc"));
    }

    #[test]
    fn test_not_html_yields_nothing() {
        let m = get_data_from_page("%PDF-1.7 binary garbage", &base());
        assert!(!m.has_any_data());
    }
}
