//! Article records as returned by the news backend.
//!
//! The backend forwards NewsAPI, GNews, RSS and stored documents without
//! normalizing them, so every field is optional and a few have two shapes.
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identity of an article: its URL, or the backend id when the URL
/// is missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleId(Arc<str>);

impl ArticleId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Publisher field: NewsAPI sends `{id, name}`, RSS entries send a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleSource {
    Named {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Plain(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ArticleSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, rename = "publishedAt", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, rename = "urlToImage", skip_serializing_if = "Option::is_none")]
    pub url_to_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Server-side annotation such as "Recommended" or "Read".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dislike_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub share_count: i64,
}

impl Article {
    /// URL when present, otherwise the backend id. `None` means the article
    /// cannot take part in engagement and is dropped from feeds.
    pub fn identity(&self) -> Option<ArticleId> {
        non_blank(self.url.as_deref())
            .or_else(|| non_blank(self.id.as_deref()))
            .map(ArticleId::new)
    }

    pub fn summary_text(&self) -> Option<&str> {
        non_blank(self.description.as_deref()).or_else(|| non_blank(self.summary.as_deref()))
    }

    pub fn source_name(&self) -> Option<&str> {
        let from_source = match &self.source {
            Some(ArticleSource::Named { name, .. }) => non_blank(name.as_deref()),
            Some(ArticleSource::Plain(s)) => non_blank(Some(s)),
            None => None,
        };
        from_source.or_else(|| non_blank(self.channel.as_deref()))
    }

    /// Publication time; NewsAPI uses RFC 3339, RSS entries RFC 2822.
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        let raw = non_blank(self.published_at.as_deref())?;
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .ok()
    }
}

/// Upstream records sometimes carry explicit nulls for scalar fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
