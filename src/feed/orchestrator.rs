use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{FeedError, RefreshOutcome, Tab, TabView};
use crate::api::{ApiError, FeedService, LocationService};
use crate::engagement::EngagementController;
use crate::events::{DeskEvent, EventBus};
use crate::filter::{FilterSpec, SearchQuery};
use crate::model::Article;

/// One displayed list and the bookkeeping needed to reject stale responses.
#[derive(Default)]
struct Slot {
    articles: Arc<Vec<Article>>,
    error: Option<Arc<str>>,
    /// Highest generation issued for this slot.
    generation: u64,
    applied_filter: Option<FilterSpec>,
}

impl Slot {
    fn view(&self) -> TabView {
        TabView {
            articles: Arc::clone(&self.articles),
            error: self.error.clone(),
            filter: self.applied_filter.clone(),
        }
    }
}

struct State {
    active: Tab,
    filter: FilterSpec,
    /// Set once the user picks a country; location lookup never overrides it.
    country_chosen: bool,
    headlines: Slot,
    trending: Slot,
    search: Slot,
    personalized: Slot,
    channels: Option<Arc<Vec<String>>>,
}

impl State {
    fn slot_mut(&mut self, target: Target) -> &mut Slot {
        match target {
            Target::Tab(Tab::Headlines) => &mut self.headlines,
            Target::Tab(Tab::Trending) => &mut self.trending,
            Target::Search => &mut self.search,
            Target::Personalized => &mut self.personalized,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Tab(Tab),
    Search,
    Personalized,
}

/// Drives fetches for the headlines and trending tabs and for search.
///
/// All mutable state sits behind one mutex that is released before any
/// remote call, so overlapping refreshes are safe to run concurrently.
pub struct FeedOrchestrator {
    feeds: Arc<dyn FeedService>,
    engagement: Arc<EngagementController>,
    events: EventBus,
    state: Mutex<State>,
}

impl FeedOrchestrator {
    pub fn new(
        feeds: Arc<dyn FeedService>,
        engagement: Arc<EngagementController>,
        events: EventBus,
        initial_filter: FilterSpec,
    ) -> Self {
        Self {
            feeds,
            engagement,
            events,
            state: Mutex::new(State {
                active: Tab::Headlines,
                filter: initial_filter,
                country_chosen: false,
                headlines: Slot::default(),
                trending: Slot::default(),
                search: Slot::default(),
                personalized: Slot::default(),
                channels: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filter(&self) -> FilterSpec {
        self.state().filter.clone()
    }

    pub fn active_tab(&self) -> Tab {
        self.state().active
    }

    pub fn view(&self, tab: Tab) -> TabView {
        self.state().slot_mut(Target::Tab(tab)).view()
    }

    pub fn articles(&self, tab: Tab) -> Arc<Vec<Article>> {
        Arc::clone(&self.state().slot_mut(Target::Tab(tab)).articles)
    }

    pub fn search_results(&self) -> TabView {
        self.state().search.view()
    }

    pub fn personalized_results(&self) -> TabView {
        self.state().personalized.view()
    }

    /// Replaces the active filter and refetches headlines if they are on screen.
    ///
    /// Returns `Ok(None)` when `spec` equals the current filter or the active
    /// tab ignores filters.
    pub async fn set_filter(&self, spec: FilterSpec) -> Result<Option<RefreshOutcome>, ApiError> {
        let active = {
            let mut state = self.state();
            if state.filter == spec {
                return Ok(None);
            }
            if state.filter.country() != spec.country() {
                state.country_chosen = true;
            }
            tracing::debug!(?spec, "Filter changed");
            state.filter = spec;
            state.active
        };

        if active.is_filter_driven() {
            self.refresh_tab(active).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Convenience over [`set_filter`](Self::set_filter) for the country picker.
    pub async fn set_country(&self, country: &str) -> Result<Option<RefreshOutcome>, FeedError> {
        let spec = self.filter().with_country(country)?;
        Ok(self.set_filter(spec).await?)
    }

    /// Switches tabs. Trending always refetches; headlines refetch only when
    /// the filter changed since their list was last applied.
    pub async fn set_active_tab(&self, tab: Tab) -> Result<Option<RefreshOutcome>, ApiError> {
        let needs_fetch = {
            let mut state = self.state();
            state.active = tab;
            match tab {
                Tab::Trending => true,
                Tab::Headlines => state.headlines.applied_filter.as_ref() != Some(&state.filter),
            }
        };

        if needs_fetch {
            self.refresh_tab(tab).await.map(Some)
        } else {
            tracing::debug!(%tab, "Reusing current list");
            Ok(None)
        }
    }

    /// Refetches the active tab.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        let tab = self.active_tab();
        self.refresh_tab(tab).await
    }

    /// Refetches one tab regardless of which is active.
    ///
    /// A failure leaves the previous list in place and records the error on
    /// the tab; a failure of a superseded request is discarded like a stale
    /// success.
    pub async fn refresh_tab(&self, tab: Tab) -> Result<RefreshOutcome, ApiError> {
        let (generation, filter) = {
            let mut state = self.state();
            let filter = state.filter.clone();
            let slot = state.slot_mut(Target::Tab(tab));
            slot.generation += 1;
            (slot.generation, tab.is_filter_driven().then_some(filter))
        };

        let result = match &filter {
            Some(filter) => self.feeds.headlines(filter).await,
            None => self.feeds.trending().await,
        };

        self.settle(Target::Tab(tab), generation, filter, result)
    }

    /// Runs a keyword search into the search slot.
    pub async fn search(&self, query: SearchQuery) -> Result<RefreshOutcome, ApiError> {
        let generation = {
            let mut state = self.state();
            state.search.generation += 1;
            state.search.generation
        };

        let result = self.feeds.search(&query).await;
        self.settle(Target::Search, generation, None, result)
    }

    /// Fetches the signed-in user's personalized headlines from `source`.
    ///
    /// Articles keep the backend's `status` annotation. Signed-out callers
    /// get [`ApiError::Unauthenticated`] without a request being sent.
    pub async fn personalized(&self, source: &str) -> Result<RefreshOutcome, ApiError> {
        let generation = {
            let mut state = self.state();
            state.personalized.generation += 1;
            state.personalized.generation
        };

        let result = self.feeds.personalized(source).await;
        self.settle(Target::Personalized, generation, None, result)
    }

    /// Source identifiers for the filter picker, fetched once per session.
    pub async fn channels(&self) -> Result<Arc<Vec<String>>, ApiError> {
        if let Some(channels) = self.state().channels.clone() {
            return Ok(channels);
        }

        let channels = Arc::new(self.feeds.channels().await?);
        self.state().channels = Some(Arc::clone(&channels));
        Ok(channels)
    }

    /// Seeds the filter country from a location lookup.
    ///
    /// Applied only while the user has not picked a country, including a
    /// pick made during the lookup. Lookup failures and unusable codes are
    /// logged and otherwise ignored. Returns the applied country.
    pub async fn bootstrap_location(&self, locator: &dyn LocationService) -> Option<String> {
        if self.state().country_chosen {
            tracing::debug!("Country already chosen, skipping location lookup");
            return None;
        }

        let location = match locator.locate().await {
            Ok(location) => location,
            Err(e) => {
                tracing::debug!(error = %e, "Location lookup failed, keeping default country");
                return None;
            }
        };
        let code = location.country_code?;

        let (country, refetch) = {
            let mut state = self.state();
            if state.country_chosen {
                tracing::debug!("Country chosen during location lookup, ignoring result");
                return None;
            }
            let spec = match state.filter.with_country(&code) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::debug!(error = %e, "Location returned unusable country code");
                    return None;
                }
            };
            if spec == state.filter {
                return None;
            }
            let country = spec.country().to_string();
            state.filter = spec;
            (country, state.active.is_filter_driven())
        };

        tracing::info!(country = %country, "Detected country from location");
        self.events.publish(DeskEvent::CountryDetected {
            country: country.clone(),
        });

        if refetch {
            if let Err(e) = self.refresh_tab(Tab::Headlines).await {
                tracing::warn!(error = %e, "Headline refresh after location lookup failed");
            }
        }
        Some(country)
    }

    /// Applies `result` to the slot if `generation` is still current.
    fn settle(
        &self,
        target: Target,
        generation: u64,
        filter: Option<FilterSpec>,
        result: Result<Vec<Article>, ApiError>,
    ) -> Result<RefreshOutcome, ApiError> {
        let result = result.map(dedupe);

        let mut state = self.state();
        let slot = state.slot_mut(target);
        if generation != slot.generation {
            tracing::debug!(
                ?target,
                expected = slot.generation,
                got = generation,
                "Ignoring stale feed response (generation mismatch)"
            );
            return Ok(RefreshOutcome::Stale);
        }

        match result {
            Ok(articles) => {
                let count = articles.len();
                // Registered before anyone can observe the list
                self.engagement.register(&articles);
                slot.articles = Arc::new(articles);
                slot.error = None;
                slot.applied_filter = filter;
                drop(state);

                tracing::debug!(?target, count, "Feed updated");
                self.events.publish(match target {
                    Target::Tab(tab) => DeskEvent::FeedUpdated { tab, count },
                    Target::Search => DeskEvent::SearchUpdated { count },
                    Target::Personalized => DeskEvent::PersonalizedUpdated { count },
                });
                Ok(RefreshOutcome::Applied { count })
            }
            Err(e) => {
                let message: Arc<str> = e.to_string().into();
                slot.error = Some(Arc::clone(&message));
                drop(state);

                tracing::warn!(?target, error = %e, "Feed fetch failed, keeping previous list");
                if let Target::Tab(tab) = target {
                    self.events.publish(DeskEvent::FeedFailed {
                        tab,
                        error: message,
                    });
                }
                Err(e)
            }
        }
    }
}

/// Drops articles without an identity and repeats of an earlier identity.
fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let total = articles.len();
    let mut seen = HashSet::with_capacity(total);
    let mut anonymous = 0usize;

    let kept: Vec<Article> = articles
        .into_iter()
        .filter(|article| match article.identity() {
            Some(id) => seen.insert(id),
            None => {
                anonymous += 1;
                false
            }
        })
        .collect();

    if anonymous > 0 {
        tracing::warn!(anonymous, "Skipped articles without url or id");
    }
    if kept.len() + anonymous < total {
        tracing::debug!(duplicates = total - kept.len() - anonymous, "Removed duplicate articles");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Location};
    use crate::config::Config;
    use crate::model::ArticleId;
    use crate::session::Session;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    type Reply = oneshot::Sender<Result<Vec<Article>, ApiError>>;

    /// Feed fake. In manual mode every list call parks until answered by index.
    #[derive(Default)]
    struct FakeFeeds {
        manual: bool,
        failing: AtomicBool,
        calls: Mutex<Vec<String>>,
        parked: Mutex<Vec<Option<Reply>>>,
    }

    impl FakeFeeds {
        fn manual() -> Self {
            Self {
                manual: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, index: usize, result: Result<Vec<Article>, ApiError>) {
            let tx = self.parked.lock().unwrap()[index].take().expect("call not parked");
            let _ = tx.send(result);
        }

        async fn respond(&self, call: String, articles: Vec<Article>) -> Result<Vec<Article>, ApiError> {
            self.calls.lock().unwrap().push(call);
            if self.manual {
                let (tx, rx) = oneshot::channel();
                self.parked.lock().unwrap().push(Some(tx));
                return rx.await.unwrap_or(Err(ApiError::Timeout));
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApiError::HttpStatus(502));
            }
            Ok(articles)
        }
    }

    #[async_trait]
    impl FeedService for FakeFeeds {
        async fn headlines(&self, filter: &FilterSpec) -> Result<Vec<Article>, ApiError> {
            let country = filter.country().to_string();
            self.respond(format!("headlines:{country}"), articles(&country, 2))
                .await
        }
        async fn trending(&self) -> Result<Vec<Article>, ApiError> {
            self.respond("trending".into(), articles("trending", 3)).await
        }
        async fn channels(&self) -> Result<Vec<String>, ApiError> {
            self.calls.lock().unwrap().push("channels".into());
            Ok(vec!["bbc-news".into(), "cnn".into()])
        }
        async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, ApiError> {
            self.respond(format!("search:{}", query.keywords), articles(&query.keywords, 1))
                .await
        }
        async fn personalized(&self, source: &str) -> Result<Vec<Article>, ApiError> {
            let mut picked = articles(source, 2);
            picked[0].status = Some("Recommended".into());
            self.respond(format!("personalized:{source}"), picked).await
        }
    }

    struct FixedLocation(Option<&'static str>);

    #[async_trait]
    impl LocationService for FixedLocation {
        async fn locate(&self) -> Result<Location, ApiError> {
            match self.0 {
                Some(code) => Ok(Location {
                    country_code: Some(code.to_string()),
                    ..Location::default()
                }),
                None => Err(ApiError::Timeout),
            }
        }
    }

    fn articles(prefix: &str, n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article {
                url: Some(format!("https://{prefix}.example/{i}")),
                title: format!("{prefix} {i}"),
                ..Article::default()
            })
            .collect()
    }

    fn spec(country: &str) -> FilterSpec {
        FilterSpec::new(country, None, "all", "").unwrap()
    }

    fn orchestrator(feeds: Arc<FakeFeeds>) -> (FeedOrchestrator, Arc<EngagementController>) {
        let events = EventBus::new();
        let offline = ApiClient::new(&Config::default(), Session::anonymous()).unwrap();
        let engagement = Arc::new(EngagementController::new(
            Arc::new(offline),
            Session::anonymous(),
            events.clone(),
        ));
        let orch = FeedOrchestrator::new(feeds, Arc::clone(&engagement), events, spec("us"));
        (orch, engagement)
    }

    fn urls(list: &[Article]) -> Vec<String> {
        list.iter().filter_map(|a| a.url.clone()).collect()
    }

    #[tokio::test]
    async fn test_refresh_registers_articles() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, engagement) = orchestrator(feeds);

        assert_eq!(orch.refresh().await.unwrap(), RefreshOutcome::Applied { count: 2 });
        assert_eq!(orch.articles(Tab::Headlines).len(), 2);
        assert_eq!(engagement.tracked(), 2);
        assert_eq!(orch.view(Tab::Headlines).filter, Some(spec("us")));
    }

    #[tokio::test]
    async fn test_latest_filter_wins_regardless_of_arrival_order() {
        let feeds = Arc::new(FakeFeeds::manual());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        let mut a = Box::pin(orch.set_filter(spec("gb")));
        assert!(futures::poll!(&mut a).is_pending());
        let mut b = Box::pin(orch.set_filter(spec("de")));
        assert!(futures::poll!(&mut b).is_pending());
        let mut c = Box::pin(orch.set_filter(spec("fr")));
        assert!(futures::poll!(&mut c).is_pending());

        feeds.answer(2, Ok(articles("fr", 2)));
        assert_eq!(c.await.unwrap(), Some(RefreshOutcome::Applied { count: 2 }));
        feeds.answer(0, Ok(articles("gb", 2)));
        assert_eq!(a.await.unwrap(), Some(RefreshOutcome::Stale));
        feeds.answer(1, Ok(articles("de", 2)));
        assert_eq!(b.await.unwrap(), Some(RefreshOutcome::Stale));

        assert_eq!(
            urls(&orch.articles(Tab::Headlines)),
            urls(&articles("fr", 2))
        );
        assert_eq!(orch.view(Tab::Headlines).filter, Some(spec("fr")));
    }

    #[tokio::test]
    async fn test_stale_failure_is_silent() {
        let feeds = Arc::new(FakeFeeds::manual());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        let mut first = Box::pin(orch.set_filter(spec("gb")));
        assert!(futures::poll!(&mut first).is_pending());
        let mut second = Box::pin(orch.set_filter(spec("de")));
        assert!(futures::poll!(&mut second).is_pending());

        feeds.answer(0, Err(ApiError::HttpStatus(500)));
        assert_eq!(first.await.unwrap(), Some(RefreshOutcome::Stale));
        feeds.answer(1, Ok(articles("de", 1)));
        second.await.unwrap();

        assert!(orch.view(Tab::Headlines).error.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_list() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));
        orch.refresh().await.unwrap();

        feeds.failing.store(true, Ordering::SeqCst);
        assert!(orch.set_filter(spec("de")).await.is_err());

        let view = orch.view(Tab::Headlines);
        assert_eq!(view.articles.len(), 2);
        assert!(view.error.is_some());
        assert_eq!(view.filter, Some(spec("us")));

        feeds.failing.store(false, Ordering::SeqCst);
        orch.refresh().await.unwrap();
        assert!(orch.view(Tab::Headlines).error.is_none());
    }

    #[tokio::test]
    async fn test_equal_filter_is_noop() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        let same = FilterSpec::new(" US ", None, "", "  ").unwrap();
        assert_eq!(orch.set_filter(same).await.unwrap(), None);
        assert!(feeds.calls().is_empty());
    }

    #[tokio::test]
    async fn test_trending_ignores_filter() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        orch.set_active_tab(Tab::Trending).await.unwrap();
        assert_eq!(orch.set_filter(spec("de")).await.unwrap(), None);
        assert_eq!(feeds.calls(), vec!["trending".to_string()]);
        assert_eq!(orch.articles(Tab::Trending).len(), 3);
        assert!(orch.view(Tab::Trending).filter.is_none());
    }

    #[tokio::test]
    async fn test_switching_back_to_headlines_reuses_list() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));
        orch.refresh().await.unwrap();

        orch.set_active_tab(Tab::Trending).await.unwrap();
        assert_eq!(orch.set_active_tab(Tab::Headlines).await.unwrap(), None);

        orch.set_active_tab(Tab::Trending).await.unwrap();
        orch.set_filter(spec("de")).await.unwrap();
        assert!(orch.set_active_tab(Tab::Headlines).await.unwrap().is_some());

        assert_eq!(
            feeds.calls(),
            vec!["headlines:us", "trending", "trending", "headlines:de"]
        );
    }

    #[tokio::test]
    async fn test_duplicates_and_anonymous_articles_dropped() {
        let mut list = articles("x", 2);
        list.push(list[0].clone());
        list.push(Article {
            title: "no identity".into(),
            ..Article::default()
        });
        list.push(Article {
            id: Some("mongo-1".into()),
            ..Article::default()
        });

        let kept = dedupe(list);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].identity(), Some(ArticleId::new("mongo-1")));
    }

    #[tokio::test]
    async fn test_engagement_state_shared_across_tabs() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, engagement) = orchestrator(feeds);
        orch.refresh().await.unwrap();
        orch.set_active_tab(Tab::Trending).await.unwrap();
        orch.set_active_tab(Tab::Headlines).await.unwrap();

        assert_eq!(engagement.tracked(), 5);
    }

    #[tokio::test]
    async fn test_bootstrap_applies_detected_country() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));
        let mut rx = orch.events.subscribe();

        let applied = orch.bootstrap_location(&FixedLocation(Some("IN"))).await;
        assert_eq!(applied.as_deref(), Some("in"));
        assert_eq!(orch.filter().country(), "in");
        assert_eq!(feeds.calls(), vec!["headlines:in".to_string()]);

        match rx.try_recv().unwrap() {
            DeskEvent::CountryDetected { country } => assert_eq!(country, "in"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_respects_user_choice() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));
        orch.set_country("gb").await.unwrap();

        assert_eq!(orch.bootstrap_location(&FixedLocation(Some("in"))).await, None);
        assert_eq!(orch.filter().country(), "gb");
    }

    #[tokio::test]
    async fn test_bootstrap_user_choice_during_lookup_wins() {
        struct Gated(Mutex<Option<oneshot::Receiver<()>>>);

        #[async_trait]
        impl LocationService for Gated {
            async fn locate(&self) -> Result<Location, ApiError> {
                let rx = self.0.lock().unwrap().take().unwrap();
                let _ = rx.await;
                Ok(Location {
                    country_code: Some("in".into()),
                    ..Location::default()
                })
            }
        }

        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(feeds);
        let (tx, rx) = oneshot::channel();
        let locator = Gated(Mutex::new(Some(rx)));

        let mut lookup = Box::pin(orch.bootstrap_location(&locator));
        assert!(futures::poll!(&mut lookup).is_pending());
        orch.set_country("gb").await.unwrap();
        tx.send(()).unwrap();

        assert_eq!(lookup.await, None);
        assert_eq!(orch.filter().country(), "gb");
    }

    #[tokio::test]
    async fn test_bootstrap_failures_are_silent() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        assert_eq!(orch.bootstrap_location(&FixedLocation(None)).await, None);
        assert_eq!(orch.bootstrap_location(&FixedLocation(Some("usa"))).await, None);
        assert_eq!(orch.filter().country(), "us");
        assert!(feeds.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_country_rejected() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(feeds);
        assert!(matches!(
            orch.set_country("u5").await,
            Err(FeedError::Filter(_))
        ));
    }

    #[tokio::test]
    async fn test_channels_fetched_once() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        assert_eq!(orch.channels().await.unwrap().len(), 2);
        assert_eq!(orch.channels().await.unwrap().len(), 2);
        assert_eq!(feeds.calls(), vec!["channels".to_string()]);
    }

    #[tokio::test]
    async fn test_search_discards_superseded_query() {
        let feeds = Arc::new(FakeFeeds::manual());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        let mut rust = Box::pin(orch.search(SearchQuery::keywords("rust")));
        assert!(futures::poll!(&mut rust).is_pending());
        let mut python = Box::pin(orch.search(SearchQuery::keywords("python")));
        assert!(futures::poll!(&mut python).is_pending());

        feeds.answer(1, Ok(articles("python", 1)));
        assert_eq!(python.await.unwrap(), RefreshOutcome::Applied { count: 1 });
        feeds.answer(0, Ok(articles("rust", 1)));
        assert_eq!(rust.await.unwrap(), RefreshOutcome::Stale);

        assert_eq!(
            urls(&orch.search_results().articles),
            urls(&articles("python", 1))
        );
        assert!(orch.articles(Tab::Headlines).is_empty());
    }

    #[tokio::test]
    async fn test_personalized_slot_keeps_status_and_discards_stale() {
        let feeds = Arc::new(FakeFeeds::manual());
        let (orch, engagement) = orchestrator(Arc::clone(&feeds));

        let mut newsapi = Box::pin(orch.personalized("newsapi"));
        assert!(futures::poll!(&mut newsapi).is_pending());
        let mut gnews = Box::pin(orch.personalized("gnews"));
        assert!(futures::poll!(&mut gnews).is_pending());

        let mut picked = articles("gnews", 2);
        picked[0].status = Some("Recommended".into());
        feeds.answer(1, Ok(picked));
        assert_eq!(gnews.await.unwrap(), RefreshOutcome::Applied { count: 2 });
        feeds.answer(0, Ok(articles("newsapi", 2)));
        assert_eq!(newsapi.await.unwrap(), RefreshOutcome::Stale);

        let view = orch.personalized_results();
        assert_eq!(urls(&view.articles), urls(&articles("gnews", 2)));
        assert_eq!(view.articles[0].status.as_deref(), Some("Recommended"));
        assert_eq!(engagement.tracked(), 2);
        assert!(orch.articles(Tab::Headlines).is_empty());
    }

    #[tokio::test]
    async fn test_personalized_failure_recorded_on_its_slot() {
        let feeds = Arc::new(FakeFeeds::default());
        let (orch, _) = orchestrator(Arc::clone(&feeds));

        orch.personalized("newsapi").await.unwrap();
        feeds.failing.store(true, Ordering::SeqCst);
        assert!(orch.personalized("newsapi").await.is_err());

        let view = orch.personalized_results();
        assert_eq!(view.articles.len(), 2);
        assert!(view.error.is_some());
        assert!(orch.view(Tab::Headlines).error.is_none());
    }
}
