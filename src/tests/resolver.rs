use crate::config::{ProviderConfig, ResolverConfig};
use crate::metadata::{ResolveError, Resolver, Synthesizer};
use mockito::Matcher;

const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Example Page</title>
  <meta name="description" content="A page about examples">
  <meta property="og:image" content="/static/og.png">
  <link rel="icon" href="/favicon.ico">
</head>
<body><h1>hello</h1></body>
</html>"#;

fn scrape_only() -> ResolverConfig {
    ResolverConfig {
        provider: ProviderConfig {
            enabled: false,
            ..Default::default()
        },
        fetch_timeout_secs: 5,
        ..Default::default()
    }
}

fn with_provider(endpoint: String) -> ResolverConfig {
    ResolverConfig {
        provider: ProviderConfig {
            enabled: true,
            endpoint,
            api_key: None,
            timeout_secs: 5,
        },
        fetch_timeout_secs: 5,
        ..Default::default()
    }
}

#[test]
fn provider_success_is_used_as_is() {
    let mut provider = mockito::Server::new();
    let provider_mock = provider
        .mock("GET", Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "status": "success",
                "data": {
                    "title": "Provider Title",
                    "description": "Provider description",
                    "image": {"url": "https://cdn.example.com/og.png"},
                    "logo": {"url": "https://cdn.example.com/logo.png"}
                }
            }"#,
        )
        .create();

    let resolver = Resolver::new(&with_provider(provider.url()));
    let result = resolver.resolve("https://example.com/article").unwrap();

    provider_mock.assert();
    assert_eq!(result.title, "Provider Title");
    assert_eq!(result.description, "Provider description");
    assert_eq!(result.image_url.as_deref(), Some("https://cdn.example.com/og.png"));
    assert_eq!(result.favicon.as_deref(), Some("https://cdn.example.com/logo.png"));
}

#[test]
fn provider_failure_falls_back_to_page_scrape() {
    let mut provider = mockito::Server::new();
    let provider_mock = provider
        .mock("GET", Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .expect(1)
        .create();

    let mut target = mockito::Server::new();
    let page_mock = target
        .mock("GET", "/article")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(PAGE)
        .expect(1)
        .create();

    let url = format!("{}/article", target.url());
    let resolver = Resolver::new(&with_provider(provider.url()));
    let result = resolver.resolve(&url).unwrap();

    provider_mock.assert();
    page_mock.assert();
    assert_eq!(result.title, "Example Page");
    assert_eq!(result.description, "A page about examples");
    assert_eq!(
        result.image_url,
        Some(format!("{}/static/og.png", target.url()))
    );
    assert_eq!(result.favicon, Some(format!("{}/favicon.ico", target.url())));
}

#[test]
fn provider_error_status_in_body_falls_back() {
    let mut provider = mockito::Server::new();
    provider
        .mock("GET", Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "fail", "message": "rate limited"}"#)
        .create();

    let mut target = mockito::Server::new();
    target
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Scraped</title></head></html>")
        .create();

    let url = format!("{}/", target.url());
    let resolver = Resolver::new(&with_provider(provider.url()));
    let result = resolver.resolve(&url).unwrap();

    assert_eq!(result.title, "Scraped");
}

#[test]
fn unreachable_provider_falls_back_to_page_scrape() {
    let mut target = mockito::Server::new();
    let target_mock = target
        .mock("GET", "/post")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            r#"<html><head>
                 <title>Example</title>
                 <meta property="og:description" content="Desc">
               </head></html>"#,
        )
        .expect(1)
        .create();

    // nothing listens on port 1
    let config = with_provider("http://127.0.0.1:1".to_string());
    let synth = Synthesizer::new(&config);
    let url = format!("{}/post", target.url());
    let result = Resolver::new(&config).resolve(&url).unwrap();

    target_mock.assert();
    assert_eq!(result.title, "Example");
    assert_eq!(result.description, "Desc");
    assert_eq!(result.image_url, Some(synth.image_url(&url)));
    assert_eq!(result.favicon, synth.favicon_url(&url));
}

#[test]
fn page_without_metadata_gets_placeholders() {
    let mut target = mockito::Server::new();
    target
        .mock("GET", "/bare")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>nothing here</body></html>")
        .create();

    let url = format!("{}/bare", target.url());
    let config = scrape_only();
    let synth = Synthesizer::new(&config);
    let result = Resolver::new(&config).resolve(&url).unwrap();

    assert_eq!(result.title, "");
    assert_eq!(result.description, "");
    assert_eq!(result.image_url, Some(synth.image_url(&url)));
    assert_eq!(result.favicon, synth.favicon_url(&url));
}

#[test]
fn target_error_status_is_recovered_with_placeholders() {
    let mut target = mockito::Server::new();
    target.mock("GET", "/missing").with_status(404).create();

    let url = format!("{}/missing", target.url());
    let config = scrape_only();
    let synth = Synthesizer::new(&config);
    let result = Resolver::new(&config).resolve(&url).unwrap();

    assert_eq!(result.title, "");
    assert_eq!(result.image_url, Some(synth.image_url(&url)));
    assert_eq!(
        result.favicon.as_deref(),
        Some("https://www.google.com/s2/favicons?domain=127.0.0.1&sz=64")
    );
}

#[test]
fn unreachable_target_is_an_error() {
    // nothing listens on port 1
    let config = with_provider("http://127.0.0.1:1".to_string());
    let err = Resolver::new(&config)
        .resolve("http://127.0.0.1:1/page")
        .unwrap_err();

    match err {
        ResolveError::Unreachable { url, .. } => assert_eq!(url, "http://127.0.0.1:1/page"),
    }
}

#[test]
fn relative_favicon_resolves_against_final_url() {
    let mut target = mockito::Server::new();
    target
        .mock("GET", "/old")
        .with_status(301)
        .with_header("location", "/docs/guide/")
        .create();
    target
        .mock("GET", "/docs/guide/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            r#"<html><head>
                 <title>Guide</title>
                 <link rel="apple-touch-icon" href="/apple.png">
                 <link rel="shortcut icon" href="icon.png">
               </head></html>"#,
        )
        .create();

    let url = format!("{}/old", target.url());
    let result = Resolver::new(&scrape_only()).resolve(&url).unwrap();

    assert_eq!(result.title, "Guide");
    assert_eq!(
        result.favicon,
        Some(format!("{}/docs/guide/icon.png", target.url()))
    );
}

#[test]
fn repeated_resolution_is_stable() {
    let mut target = mockito::Server::new();
    target
        .mock("GET", "/same")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(PAGE)
        .expect(2)
        .create();

    let url = format!("{}/same", target.url());
    let resolver = Resolver::new(&scrape_only());

    let first = resolver.resolve(&url).unwrap();
    let second = resolver.resolve(&url).unwrap();
    assert_eq!(first, second);
}
