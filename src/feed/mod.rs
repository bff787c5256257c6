//! Tabbed article feeds.
//!
//! [`FeedOrchestrator`] keeps one article list per [`Tab`] consistent with
//! the active [`FilterSpec`](crate::filter::FilterSpec):
//!
//! - **Headlines** follow the filter and refetch whenever it changes
//! - **Trending** is globally ranked and ignores the filter
//! - **Search** results live in their own slot outside the tab bar
//! - **Personalized** headlines (signed in only) get a slot of their own too
//!
//! Every fetch is stamped with a per-slot generation. A response is applied
//! only if its generation is still the newest one issued for that slot, so
//! slow responses to superseded requests never overwrite newer lists.

mod orchestrator;

pub use orchestrator::FeedOrchestrator;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::api::ApiError;
use crate::filter::{FilterError, FilterSpec};
use crate::model::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Headlines,
    Trending,
}

impl Tab {
    /// Whether the tab's contents depend on the active filter.
    pub fn is_filter_driven(self) -> bool {
        matches!(self, Tab::Headlines)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Headlines => "headlines",
            Tab::Trending => "trending",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a fetch that completed without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the displayed list.
    Applied { count: usize },
    /// A newer request was issued while this one was in flight; the
    /// response (or its failure) was discarded.
    Stale,
}

/// What a tab currently displays.
#[derive(Debug, Clone, Default)]
pub struct TabView {
    pub articles: Arc<Vec<Article>>,
    /// Message from the most recent failed fetch, cleared by the next success.
    /// The list above is the last good one.
    pub error: Option<Arc<str>>,
    /// Filter that produced `articles`, for filter-driven tabs.
    pub filter: Option<FilterSpec>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
