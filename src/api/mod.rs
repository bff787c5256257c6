//! Remote collaborators and their HTTP implementation.
//!
//! The orchestrator, engagement controller and image resolver only see the
//! traits declared here. [`ApiClient`] implements the feed, engagement and
//! location traits against the backend's JSON endpoints; tests substitute
//! in-memory fakes.
//!
//! # Endpoints
//!
//! | call | request | response |
//! |---|---|---|
//! | headlines | `GET /news?country&category&source&q` | `{articles}` |
//! | trending | `GET /news/trending` | `{trending}` |
//! | channels | `GET /news/channels` | `{channels}` |
//! | search | `GET /search?keywords&start_date&end_date&source&limit` | `{results}` |
//! | personalized | `GET /news/personalized?source` (signed in) | `{articles}` |
//! | locate | `GET /location` | `{location: {country_code, country, city}}` |
//! | like / dislike / history | `POST /user/articles/{id}/…` | any |
//! | bookmark | `POST` / `DELETE /user/articles/{id}/bookmark` | any |
//! | bookmarks | `GET /user/bookmarks` | `{bookmarks}` |
//! | recently viewed | `GET /user/recently-viewed` | `{recently_viewed: [id]}` |
//! | share | `GET /user/articles/{id}/share?title=` | `{platform: url}` |

mod client;
mod enhancer;
mod error;

pub use client::ApiClient;
pub use enhancer::{NoEnhancer, ProbeEnhancer};
pub use error::ApiError;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::filter::{FilterSpec, SearchQuery};
use crate::model::{Article, ArticleId};

/// Platform name → share URL, sorted by platform.
pub type ShareLinks = BTreeMap<String, String>;

/// Best-guess location of the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Read-only news endpoints.
#[async_trait]
pub trait FeedService: Send + Sync {
    async fn headlines(&self, filter: &FilterSpec) -> Result<Vec<Article>, ApiError>;
    async fn trending(&self) -> Result<Vec<Article>, ApiError>;
    async fn channels(&self) -> Result<Vec<String>, ApiError>;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, ApiError>;
    /// Headlines picked from the signed-in user's preferences, annotated
    /// with a per-article `status`. `source` selects the upstream provider.
    async fn personalized(&self, source: &str) -> Result<Vec<Article>, ApiError>;
}

/// Per-user engagement storage. Every call requires a signed-in session.
#[async_trait]
pub trait EngagementService: Send + Sync {
    async fn like(&self, id: &ArticleId) -> Result<(), ApiError>;
    async fn dislike(&self, id: &ArticleId) -> Result<(), ApiError>;
    /// Stores the full article so the bookmark list can be served later
    /// without refetching it.
    async fn bookmark(&self, id: &ArticleId, article: &Article) -> Result<(), ApiError>;
    async fn unbookmark(&self, id: &ArticleId) -> Result<(), ApiError>;
    async fn record_read(&self, id: &ArticleId) -> Result<(), ApiError>;
    async fn share_links(&self, id: &ArticleId, title: &str) -> Result<ShareLinks, ApiError>;
    async fn bookmarks(&self) -> Result<Vec<Article>, ApiError>;
    /// Identities in the user's reading history.
    async fn recently_viewed(&self) -> Result<Vec<ArticleId>, ApiError>;
}

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn locate(&self) -> Result<Location, ApiError>;
}

/// Optional lookup that validates or rewrites an article's raw image.
///
/// `Ok(None)` means "no better URL"; the resolver then falls back to the
/// raw candidates.
#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    async fn enhance(
        &self,
        article: &Article,
        raw_candidate: Option<&str>,
    ) -> Result<Option<String>, ApiError>;
}

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ArticlesEnvelope {
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendingEnvelope {
    #[serde(default)]
    pub trending: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelsEnvelope {
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchEnvelope {
    #[serde(default)]
    pub results: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarksEnvelope {
    #[serde(default)]
    pub bookmarks: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentlyViewedEnvelope {
    #[serde(default)]
    pub recently_viewed: Vec<String>,
}

/// The backend answers `{"location": "unavailable"}` when lookup fails.
#[derive(Debug, Deserialize)]
pub(crate) struct LocationEnvelope {
    pub location: LocationField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LocationField {
    Found(Location),
    Unavailable(String),
}
