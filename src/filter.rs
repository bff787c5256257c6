//! Feed query parameters and the fixed topic vocabulary.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Source value that selects every channel.
pub const ALL_SOURCES: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid country code {0:?} (expected two letters, e.g. \"us\")")]
    InvalidCountry(String),
    #[error("Unknown category {0:?}")]
    UnknownCategory(String),
}

// ============================================================================
// Category
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Business,
    Entertainment,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Business,
        Category::Entertainment,
        Category::Health,
        Category::Science,
        Category::Sports,
        Category::Technology,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Technology => &[
                "technology", "tech", "software", " ai ", "artificial intelligence", "startup",
                "apple", "google", "microsoft", "smartphone", "cyber", "hacker", "chip",
            ],
            Category::Business => &[
                "business", "market", "stock", "economy", "economic", "finance", "bank",
                "earnings", "trade", "investor", "inflation",
            ],
            Category::Sports => &[
                "sport", "football", "soccer", "cricket", "tennis", "basketball", "olympic",
                "championship", "league", "match", "tournament",
            ],
            Category::Health => &[
                "health", "medical", "medicine", "hospital", "disease", "vaccine", "virus",
                "covid", "doctor", "wellness",
            ],
            Category::Science => &[
                "science", "research", "study", "space", "nasa", "climate", "physics",
                "biology", "scientist", "discovery",
            ],
            Category::Entertainment => &[
                "entertainment", "movie", "film", "music", "celebrity", " tv ", "television",
                "netflix", "hollywood", "album",
            ],
            Category::General => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| FilterError::UnknownCategory(s.to_string()))
    }
}

/// Order in which topics are tried; the first topic with a keyword hit wins.
const CLASSIFY_ORDER: [Category; 6] = [
    Category::Technology,
    Category::Business,
    Category::Sports,
    Category::Health,
    Category::Science,
    Category::Entertainment,
];

/// Guesses a topic from free text by lowercase keyword matching.
///
/// Defaults to [`Category::General`] when nothing matches.
pub fn classify(title: &str, description: Option<&str>) -> Category {
    // Padding lets space-delimited keywords match at either end of the text
    let haystack = format!(
        " {} {} ",
        title.to_lowercase(),
        description.unwrap_or_default().to_lowercase()
    );
    CLASSIFY_ORDER
        .into_iter()
        .find(|c| c.keywords().iter().any(|k| haystack.contains(k)))
        .unwrap_or(Category::General)
}

// ============================================================================
// FilterSpec
// ============================================================================

/// Normalized `GET /news` parameters.
///
/// Values are only reachable through constructors and `with_*` setters,
/// so two specs describing the same query always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSpec {
    country: String,
    category: Option<Category>,
    source: String,
    query: String,
}

impl FilterSpec {
    pub fn new(
        country: &str,
        category: Option<Category>,
        source: &str,
        query: &str,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            country: normalize_country(country)?,
            category,
            source: normalize_source(source),
            query: query.trim().to_string(),
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn with_country(&self, country: &str) -> Result<Self, FilterError> {
        Ok(Self {
            country: normalize_country(country)?,
            ..self.clone()
        })
    }

    pub fn with_category(&self, category: Option<Category>) -> Self {
        Self {
            category,
            ..self.clone()
        }
    }

    pub fn with_source(&self, source: &str) -> Self {
        Self {
            source: normalize_source(source),
            ..self.clone()
        }
    }

    pub fn with_query(&self, query: &str) -> Self {
        Self {
            query: query.trim().to_string(),
            ..self.clone()
        }
    }

    /// Query-string pairs for `GET /news`; empty category and query are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("country", self.country.as_str())];
        if let Some(category) = self.category {
            pairs.push(("category", category.as_str()));
        }
        pairs.push(("source", self.source.as_str()));
        if !self.query.is_empty() {
            pairs.push(("q", self.query.as_str()));
        }
        pairs
    }
}

fn normalize_country(country: &str) -> Result<String, FilterError> {
    let code = country.trim().to_ascii_lowercase();
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_lowercase()) {
        Ok(code)
    } else {
        Err(FilterError::InvalidCountry(country.to_string()))
    }
}

fn normalize_source(source: &str) -> String {
    let source = source.trim().to_ascii_lowercase();
    if source.is_empty() {
        ALL_SOURCES.to_string()
    } else {
        source
    }
}

// ============================================================================
// SearchQuery
// ============================================================================

/// Parameters for `GET /search` (keyword search over stored articles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: String,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    pub source: Option<String>,
    pub limit: u32,
}

impl SearchQuery {
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn keywords(keywords: &str) -> Self {
        Self {
            keywords: keywords.trim().to_string(),
            start_date: None,
            end_date: None,
            source: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("keywords", self.keywords.clone())];
        if let Some(start) = &self.start_date {
            pairs.push(("start_date", start.clone()));
        }
        if let Some(end) = &self.end_date {
            pairs.push(("end_date", end.clone()));
        }
        if let Some(source) = &self.source {
            pairs.push(("source", source.clone()));
        }
        pairs.push(("limit", self.limit.max(1).to_string()));
        pairs
    }
}
