use futures::stream::{self, StreamExt};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{placeholder_url, CorsPolicy, FallbackStep, ImageSource, ResolvedImage};
use crate::api::ImageEnhancer;
use crate::config::Config;
use crate::filter::{classify, Category};
use crate::model::{Article, ArticleId};

/// Concurrent enhancement lookups when resolving a whole list.
const RESOLVE_CONCURRENCY: usize = 8;

/// Where an article sits in the failure chain.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fallback {
    /// Original failed; the relay URL is being tried.
    Proxied(String),
    /// Placeholder is showing; further failures give up.
    Placeholder,
}

struct Inner {
    enhanced: LruCache<ArticleId, String>,
    fallbacks: HashMap<ArticleId, Fallback>,
}

pub struct ImageResolver {
    enhancer: Arc<dyn ImageEnhancer>,
    cors: CorsPolicy,
    placeholder_base: String,
    inner: Mutex<Inner>,
}

impl ImageResolver {
    pub fn new(config: &Config, enhancer: Arc<dyn ImageEnhancer>) -> Self {
        let capacity = NonZeroUsize::new(config.image_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            enhancer,
            cors: CorsPolicy::new(&config.cors_restricted_hosts, &config.image_proxy_url),
            placeholder_base: config.placeholder_base_url.clone(),
            inner: Mutex::new(Inner {
                enhanced: LruCache::new(capacity),
                fallbacks: HashMap::new(),
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the image to attempt for `article`. Never fails.
    pub async fn resolve(&self, article: &Article) -> ResolvedImage {
        let key = key(article);
        let label = label(article);
        let fallback = self.placeholder_for(&key);
        let resolved = |url: String, source: ImageSource| ResolvedImage {
            url,
            fallback: fallback.clone(),
            source,
            label,
        };

        let known = {
            let mut inner = self.inner();
            match inner.fallbacks.get(&key) {
                Some(Fallback::Proxied(url)) => Some((url.clone(), ImageSource::Proxied)),
                Some(Fallback::Placeholder) => Some((fallback.clone(), ImageSource::Placeholder)),
                None => inner
                    .enhanced
                    .get(&key)
                    .map(|url| (url.clone(), ImageSource::Cached)),
            }
        };
        if let Some((url, source)) = known {
            return resolved(url, source);
        }

        let raw = raw_candidate(article);
        match self.enhancer.enhance(article, raw).await {
            Ok(Some(url)) if !url.trim().is_empty() => {
                self.inner().enhanced.put(key, url.clone());
                return resolved(url, ImageSource::Enhanced);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(article = %key, error = %e, "Image enhancement failed, using raw candidate");
            }
        }

        match raw {
            Some(url) => resolved(url.to_string(), ImageSource::Raw),
            None => resolved(fallback.clone(), ImageSource::Placeholder),
        }
    }

    /// Resolves a list with bounded concurrency, preserving order.
    pub async fn resolve_all(&self, articles: &[Article]) -> Vec<ResolvedImage> {
        stream::iter(articles)
            .map(|article| self.resolve(article))
            .buffered(RESOLVE_CONCURRENCY)
            .collect()
            .await
    }

    /// Advances the fallback chain after `failed_url` failed to load.
    ///
    /// At most two replacement loads are ever offered per article: the relay
    /// (only for CORS-restrictive hosts) and the placeholder.
    pub fn report_failure(&self, article: &Article, failed_url: &str) -> FallbackStep {
        let key = key(article);
        let placeholder = self.placeholder_for(&key);
        let mut inner = self.inner();

        let step = match inner.fallbacks.get(&key) {
            Some(Fallback::Placeholder) => FallbackStep::GiveUp,
            // Late report for the original URL; the relay attempt is already underway
            Some(Fallback::Proxied(proxy)) if proxy != failed_url && !self.cors.is_proxied(failed_url) => {
                FallbackStep::Retry(proxy.clone())
            }
            Some(Fallback::Proxied(_)) => FallbackStep::Placeholder(placeholder.clone()),
            None if failed_url == placeholder => FallbackStep::GiveUp,
            None => match self.relay_for(failed_url) {
                Some(proxy) => FallbackStep::Retry(proxy),
                None => FallbackStep::Placeholder(placeholder.clone()),
            },
        };

        match &step {
            FallbackStep::Retry(proxy) => {
                inner.fallbacks.insert(key.clone(), Fallback::Proxied(proxy.clone()));
            }
            FallbackStep::Placeholder(_) | FallbackStep::GiveUp => {
                inner.fallbacks.insert(key.clone(), Fallback::Placeholder);
            }
        }
        // A cached enhancement that failed to render is not worth serving again
        inner.enhanced.pop(&key);
        drop(inner);

        tracing::debug!(article = %key, failed = %failed_url, ?step, "Image load failed");
        step
    }

    fn relay_for(&self, failed_url: &str) -> Option<String> {
        if self.cors.is_proxied(failed_url) || !self.cors.is_likely_blocked(failed_url) {
            return None;
        }
        self.cors.proxied(failed_url)
    }

    fn placeholder_for(&self, key: &ArticleId) -> String {
        placeholder_url(&self.placeholder_base, key.as_str())
    }
}

/// Cache key; articles without identity fall back to their title.
fn key(article: &Article) -> ArticleId {
    article
        .identity()
        .unwrap_or_else(|| ArticleId::new(format!("title:{}", article.title.trim())))
}

/// First usable raw image field. Some feeds send the literal string "null".
fn raw_candidate(article: &Article) -> Option<&str> {
    [article.url_to_image.as_deref(), article.image.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

fn label(article: &Article) -> Category {
    article
        .category
        .as_deref()
        .and_then(|c| c.parse().ok())
        .unwrap_or_else(|| classify(&article.title, article.summary_text()))
}
