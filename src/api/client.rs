use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::{
    ApiError, ArticlesEnvelope, BookmarksEnvelope, ChannelsEnvelope, EngagementService,
    FeedService, Location, LocationEnvelope, LocationField, LocationService,
    RecentlyViewedEnvelope, SearchEnvelope, ShareLinks, TrendingEnvelope,
};
use crate::config::Config;
use crate::filter::{FilterSpec, SearchQuery};
use crate::model::{Article, ArticleId};
use crate::session::Session;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Share responses echo the article URL under this key; it is not a platform.
const SHARE_ECHO_KEY: &str = "share_url";

#[derive(Serialize)]
struct BookmarkPayload<'a> {
    article: &'a Article,
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// HTTP implementation of the feed, engagement and location services.
///
/// Cheap to clone: the underlying `reqwest::Client` and `Session` are
/// reference counted.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Session,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, session: Session) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_base_url)?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .user_agent(concat!("newsdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            session,
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        })
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Base URL with `segments` appended, each percent-encoded as a single
    /// path segment (article ids are URLs and contain slashes).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session
            .bearer_header()
            .ok_or(ApiError::Unauthenticated)
    }

    /// GET with retry for transient failures.
    /// Uses exponential backoff: base, 2×base, 4×base ... up to `max_retries`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, gated: bool) -> Result<T, ApiError> {
        let auth = if gated { Some(self.bearer()?) } else { None };
        let mut retry_count = 0;

        let bytes = loop {
            let mut request = self.http.get(url.clone());
            if let Some(header) = &auth {
                request = request.header(AUTHORIZATION, header);
            }

            match self.execute(request).await {
                Ok(bytes) => break bytes,
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = self.backoff.saturating_mul(1 << retry_count.min(8));
                    tracing::debug!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        };

        decode(&bytes)
    }

    /// Signed-in mutation under `/user/articles/{id}/{action}`. Never retried.
    async fn mutate_article(
        &self,
        method: Method,
        id: &ArticleId,
        action: &str,
        body: Option<&Article>,
    ) -> Result<(), ApiError> {
        let auth = self.bearer()?;
        let url = self.endpoint(&["user", "articles", id.as_str(), action])?;

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, auth);
        if let Some(article) = body {
            let payload = serde_json::to_vec(&BookmarkPayload { article })
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        self.execute(request).await.map(|_| ())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let work = async {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ApiError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_RESPONSE_SIZE).await
        };

        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| ApiError::Timeout)?
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[async_trait]
impl FeedService for ApiClient {
    async fn headlines(&self, filter: &FilterSpec) -> Result<Vec<Article>, ApiError> {
        let mut url = self.endpoint(&["news"])?;
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
        let envelope: ArticlesEnvelope = self.get_json(url, false).await?;
        Ok(envelope.articles)
    }

    async fn trending(&self) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["news", "trending"])?;
        let envelope: TrendingEnvelope = self.get_json(url, false).await?;
        Ok(envelope.trending)
    }

    async fn channels(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["news", "channels"])?;
        let envelope: ChannelsEnvelope = self.get_json(url, false).await?;
        Ok(envelope.channels)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, ApiError> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        let envelope: SearchEnvelope = self.get_json(url, false).await?;
        Ok(envelope.results)
    }

    async fn personalized(&self, source: &str) -> Result<Vec<Article>, ApiError> {
        let mut url = self.endpoint(&["news", "personalized"])?;
        url.query_pairs_mut().append_pair("source", source);
        let envelope: ArticlesEnvelope = self.get_json(url, true).await?;
        Ok(envelope.articles)
    }
}

#[async_trait]
impl EngagementService for ApiClient {
    async fn like(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.mutate_article(Method::POST, id, "like", None).await
    }

    async fn dislike(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.mutate_article(Method::POST, id, "dislike", None).await
    }

    async fn bookmark(&self, id: &ArticleId, article: &Article) -> Result<(), ApiError> {
        self.mutate_article(Method::POST, id, "bookmark", Some(article))
            .await
    }

    async fn unbookmark(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.mutate_article(Method::DELETE, id, "bookmark", None)
            .await
    }

    async fn record_read(&self, id: &ArticleId) -> Result<(), ApiError> {
        self.mutate_article(Method::POST, id, "history", None).await
    }

    async fn share_links(&self, id: &ArticleId, title: &str) -> Result<ShareLinks, ApiError> {
        let mut url = self.endpoint(&["user", "articles", id.as_str(), "share"])?;
        url.query_pairs_mut().append_pair("title", title);
        let raw: std::collections::BTreeMap<String, serde_json::Value> =
            self.get_json(url, true).await?;

        Ok(raw
            .into_iter()
            .filter(|(platform, _)| platform != SHARE_ECHO_KEY)
            .filter_map(|(platform, link)| match link {
                serde_json::Value::String(link) => Some((platform, link)),
                _ => None,
            })
            .collect())
    }

    async fn bookmarks(&self) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["user", "bookmarks"])?;
        let envelope: BookmarksEnvelope = self.get_json(url, true).await?;
        Ok(envelope.bookmarks)
    }

    async fn recently_viewed(&self) -> Result<Vec<ArticleId>, ApiError> {
        let url = self.endpoint(&["user", "recently-viewed"])?;
        let envelope: RecentlyViewedEnvelope = self.get_json(url, true).await?;
        Ok(envelope
            .recently_viewed
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(ArticleId::new)
            .collect())
    }
}

#[async_trait]
impl LocationService for ApiClient {
    async fn locate(&self) -> Result<Location, ApiError> {
        let url = self.endpoint(&["location"])?;
        let envelope: LocationEnvelope = self.get_json(url, false).await?;
        match envelope.location {
            LocationField::Found(location) => Ok(location),
            LocationField::Unavailable(reason) => {
                Err(ApiError::Decode(format!("location {reason}")))
            }
        }
    }
}
