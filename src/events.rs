//! Notifications for the rendering layer.
//!
//! Components publish on a shared broadcast channel instead of taking
//! callbacks; any number of views can subscribe. Publishing with no
//! subscribers is normal and silently dropped.
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::engagement::{EngagementState, Operation};
use crate::feed::Tab;
use crate::model::ArticleId;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum DeskEvent {
    /// A tab's article list was replaced by a fresh response.
    FeedUpdated { tab: Tab, count: usize },
    /// A fetch failed; the tab keeps its previous list.
    FeedFailed { tab: Tab, error: Arc<str> },
    /// Search results were replaced.
    SearchUpdated { count: usize },
    /// Personalized headlines were replaced.
    PersonalizedUpdated { count: usize },
    /// Location lookup set the filter country.
    CountryDetected { country: String },
    /// Engagement flags or pending markers changed for one article.
    EngagementChanged {
        article: ArticleId,
        state: EngagementState,
    },
    /// A remote engagement write failed and was rolled back.
    EngagementFailed {
        article: ArticleId,
        operation: Operation,
        error: Arc<str>,
    },
}

/// Cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeskEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, event: DeskEvent) {
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }
}
