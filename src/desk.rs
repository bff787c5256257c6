//! Wires the HTTP client, event bus and the three engines together.
use std::sync::Arc;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, ProbeEnhancer};
use crate::config::Config;
use crate::engagement::EngagementController;
use crate::events::EventBus;
use crate::feed::FeedOrchestrator;
use crate::filter::{FilterError, FilterSpec};
use crate::image::ImageResolver;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Invalid default filter: {0}")]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One signed-in (or anonymous) news session.
///
/// The session handle is shared with the API client and the engagement
/// controller, so signing in or out takes effect for every component.
pub struct NewsDesk {
    session: Session,
    api: Arc<ApiClient>,
    events: EventBus,
    engagement: Arc<EngagementController>,
    feed: Arc<FeedOrchestrator>,
    images: Arc<ImageResolver>,
}

impl NewsDesk {
    pub fn new(config: &Config, session: Session) -> Result<Self, DeskError> {
        let initial_filter =
            FilterSpec::new(&config.default_country, None, &config.default_source, "")?;
        let api = Arc::new(ApiClient::new(config, session.clone())?);
        let events = EventBus::new();

        let engagement = Arc::new(EngagementController::new(
            api.clone(),
            session.clone(),
            events.clone(),
        ));
        let feed = Arc::new(FeedOrchestrator::new(
            api.clone(),
            Arc::clone(&engagement),
            events.clone(),
            initial_filter,
        ));
        let enhancer = ProbeEnhancer::new(config.request_timeout())?;
        let images = Arc::new(ImageResolver::new(config, Arc::new(enhancer)));

        tracing::debug!(
            api = %config.api_base_url,
            signed_in = session.is_authenticated(),
            "News desk ready"
        );

        Ok(Self {
            session,
            api,
            events,
            engagement,
            feed,
            images,
        })
    }

    /// Seeds the filter country from the backend's location endpoint.
    /// See [`FeedOrchestrator::bootstrap_location`].
    pub async fn bootstrap_location(&self) -> Option<String> {
        self.feed.bootstrap_location(self.api.as_ref()).await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn feed(&self) -> &Arc<FeedOrchestrator> {
        &self.feed
    }

    pub fn engagement(&self) -> &Arc<EngagementController> {
        &self.engagement
    }

    pub fn images(&self) -> &Arc<ImageResolver> {
        &self.images
    }
}
