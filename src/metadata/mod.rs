pub mod fallback;
pub mod fetchers;
pub mod normalize;
pub mod types;

pub use fallback::Synthesizer;
pub use types::{FetchError, Metadata, MetadataResult, ResolveError};

use crate::config::ResolverConfig;
use fetchers::{microlink::MicrolinkFetcher, plain::PlainFetcher, run_logged, MetadataFetcher};

/// Resolves a url into presentable metadata.
///
/// Tiers run strictly one after another, each at most once:
/// the structured extraction provider, then a direct fetch of the page,
/// then placeholder synthesis for whatever image or favicon is still missing.
pub struct Resolver {
    primary: Option<Box<dyn MetadataFetcher>>,
    secondary: Box<dyn MetadataFetcher>,
    synthesizer: Synthesizer,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Self {
        let primary: Option<Box<dyn MetadataFetcher>> = if config.provider.enabled {
            Some(Box::new(MicrolinkFetcher::new(config)))
        } else {
            None
        };

        Self {
            primary,
            secondary: Box::new(PlainFetcher::new(config)),
            synthesizer: Synthesizer::new(config),
        }
    }

    #[cfg(test)]
    pub fn with_fetchers(
        primary: Option<Box<dyn MetadataFetcher>>,
        secondary: Box<dyn MetadataFetcher>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            synthesizer: Synthesizer::new(config),
        }
    }

    /// `url` must already be a valid absolute url (see `normalize::validate_url`).
    pub fn resolve(&self, url: &str) -> Result<MetadataResult, ResolveError> {
        let primary = self
            .primary
            .as_deref()
            .and_then(|fetcher| run_logged(fetcher, url).ok().flatten());

        let meta = match primary {
            Some(meta) => meta,
            None => match run_logged(self.secondary.as_ref(), url) {
                Ok(meta) => meta.unwrap_or_default(),
                Err(FetchError::Transport(reason)) => {
                    return Err(ResolveError::Unreachable {
                        url: url.to_string(),
                        reason,
                    });
                }
                // the target answered but gave us nothing usable
                Err(_) => Metadata::default(),
            },
        };

        Ok(self.finish(url, meta))
    }

    /// Apply the synthesis tier and flatten into the caller facing shape
    fn finish(&self, url: &str, meta: Metadata) -> MetadataResult {
        let image_url = meta
            .image_url
            .and_then(|image| normalize::resolve_against(url, &image))
            .unwrap_or_else(|| {
                log::debug!("{url}: synthesizing image");
                self.synthesizer.image_url(url)
            });

        let favicon = meta
            .icon_url
            .and_then(|icon| normalize::resolve_against(url, &icon))
            .or_else(|| {
                log::debug!("{url}: synthesizing favicon");
                self.synthesizer.favicon_url(url)
            });

        MetadataResult {
            title: meta.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            description: meta
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            image_url: Some(image_url),
            favicon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Canned {
        result: fn() -> Result<Option<Metadata>, FetchError>,
        calls: Arc<AtomicUsize>,
    }

    impl MetadataFetcher for Canned {
        fn fetch(&self, _url: &str) -> Result<Option<Metadata>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn name(&self) -> &'static str {
            "Canned"
        }
    }

    fn canned(
        result: fn() -> Result<Option<Metadata>, FetchError>,
    ) -> (Box<dyn MetadataFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Canned {
                result,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    const URL: &str = "https://example.com/blog";

    #[test]
    fn test_primary_success_skips_secondary() {
        let (primary, _) = canned(|| {
            Ok(Some(Metadata {
                title: Some(" Provider Title ".to_string()),
                description: Some("Provider description".to_string()),
                image_url: Some("https://cdn.example.com/og.png".to_string()),
                icon_url: Some("/logo.png".to_string()),
            }))
        });
        let (secondary, secondary_calls) = canned(|| Ok(Some(Metadata::default())));
        let config = ResolverConfig::default();
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let result = resolver.resolve(URL).unwrap();
        assert_eq!(result.title, "Provider Title");
        assert_eq!(result.description, "Provider description");
        assert_eq!(result.image_url.as_deref(), Some("https://cdn.example.com/og.png"));
        assert_eq!(result.favicon.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_primary_without_image_gets_synthesized_image_not_scrape() {
        let (primary, _) = canned(|| {
            Ok(Some(Metadata {
                title: Some("Title".to_string()),
                ..Default::default()
            }))
        });
        let (secondary, secondary_calls) = canned(|| Ok(Some(Metadata::default())));
        let config = ResolverConfig::default();
        let synth = Synthesizer::new(&config);
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let result = resolver.resolve(URL).unwrap();
        assert_eq!(result.image_url, Some(synth.image_url(URL)));
        assert_eq!(result.favicon, synth.favicon_url(URL));
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_primary_error_falls_through_once() {
        let (primary, primary_calls) = canned(|| Err(FetchError::Status(503)));
        let (secondary, secondary_calls) = canned(|| {
            Ok(Some(Metadata {
                title: Some("Example".to_string()),
                description: Some("Desc".to_string()),
                ..Default::default()
            }))
        });
        let config = ResolverConfig::default();
        let synth = Synthesizer::new(&config);
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let result = resolver.resolve(URL).unwrap();
        assert_eq!(
            result,
            MetadataResult {
                title: "Example".to_string(),
                description: "Desc".to_string(),
                image_url: Some(synth.image_url(URL)),
                favicon: synth.favicon_url(URL),
            }
        );
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_primary_with_nothing_useful_falls_through() {
        let (primary, _) = canned(|| Ok(None));
        let (secondary, secondary_calls) = canned(|| Ok(None));
        let config = ResolverConfig::default();
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let result = resolver.resolve(URL).unwrap();
        assert_eq!(result.title, "");
        assert!(result.image_url.is_some());
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_status_error_is_recovered() {
        let (primary, _) = canned(|| Err(FetchError::Transport("dns error".to_string())));
        let (secondary, _) = canned(|| Err(FetchError::Status(403)));
        let config = ResolverConfig::default();
        let synth = Synthesizer::new(&config);
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let result = resolver.resolve(URL).unwrap();
        assert_eq!(result.title, "");
        assert_eq!(result.description, "");
        assert_eq!(result.image_url, Some(synth.image_url(URL)));
        assert_eq!(result.favicon, synth.favicon_url(URL));
    }

    #[test]
    fn test_both_tiers_unreachable_is_an_error() {
        let (primary, _) = canned(|| Err(FetchError::Transport("timed out".to_string())));
        let (secondary, _) = canned(|| Err(FetchError::Transport("connection refused".to_string())));
        let config = ResolverConfig::default();
        let resolver = Resolver::with_fetchers(Some(primary), secondary, &config);

        let err = resolver.resolve(URL).unwrap_err();
        assert!(matches!(err, ResolveError::Unreachable { .. }));
    }

    #[test]
    fn test_disabled_provider_goes_straight_to_scrape() {
        let (secondary, secondary_calls) = canned(|| {
            Ok(Some(Metadata {
                title: Some("Scraped".to_string()),
                ..Default::default()
            }))
        });
        let config = ResolverConfig::default();
        let resolver = Resolver::with_fetchers(None, secondary, &config);

        assert_eq!(resolver.resolve(URL).unwrap().title, "Scraped");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }
}
