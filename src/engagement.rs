//! Per-article engagement state with optimistic writes.
//!
//! [`EngagementController`] is the only writer of engagement state. Each
//! mutation flips the local flags first, marks the operation pending,
//! calls the remote service and then either clears the marker or rolls
//! the flags back. State is keyed by [`ArticleId`], so the same article
//! shows the same flags in every tab that lists it.
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::api::{ApiError, EngagementService, ShareLinks};
use crate::events::{DeskEvent, EventBus};
use crate::model::{Article, ArticleId};
use crate::session::Session;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Like,
    Dislike,
    Bookmark,
    Share,
    Read,
}

/// Engagement flags for one article.
///
/// `liked` and `disliked` are never both true. `pending` holds the
/// operations whose remote call has not settled yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementState {
    pub liked: bool,
    pub disliked: bool,
    pub bookmarked: bool,
    pub read: bool,
    pub pending: BTreeSet<Operation>,
}

impl EngagementState {
    pub fn is_pending(&self, op: Operation) -> bool {
        self.pending.contains(&op)
    }

    fn flags(&self) -> Flags {
        Flags {
            liked: self.liked,
            disliked: self.disliked,
            bookmarked: self.bookmarked,
            read: self.read,
        }
    }

    fn set_flags(&mut self, flags: Flags) {
        self.liked = flags.liked;
        self.disliked = flags.disliked;
        self.bookmarked = flags.bookmarked;
        self.read = flags.read;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    liked: bool,
    disliked: bool,
    bookmarked: bool,
    read: bool,
}

/// A flag write as sent to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Like,
    Dislike,
    Bookmark(bool),
    Read,
}

impl Change {
    fn apply(self, flags: &mut Flags) {
        match self {
            Change::Like => {
                flags.liked = true;
                flags.disliked = false;
            }
            Change::Dislike => {
                flags.disliked = true;
                flags.liked = false;
            }
            Change::Bookmark(on) => flags.bookmarked = on,
            Change::Read => flags.read = true,
        }
    }
}

#[derive(Debug)]
struct Write {
    seq: u64,
    change: Change,
    acknowledged: bool,
}

/// Controller-side record for one article.
///
/// The displayed flags are always `confirmed` with the unfailed writes
/// replayed in issue order, so a failed write disappears without a trace
/// whatever else was in flight around it.
#[derive(Debug, Default)]
struct Entry {
    state: EngagementState,
    confirmed: Flags,
    writes: Vec<Write>,
    next_seq: u64,
}

impl Entry {
    fn begin(&mut self, change: Change) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.writes.push(Write {
            seq,
            change,
            acknowledged: false,
        });
        self.recompute();
        seq
    }

    /// Acknowledges or drops write `seq` and recomputes the flags.
    fn finish(&mut self, seq: u64, acknowledged: bool) {
        if acknowledged {
            if let Some(write) = self.writes.iter_mut().find(|w| w.seq == seq) {
                write.acknowledged = true;
            }
        } else {
            self.writes.retain(|w| w.seq != seq);
        }
        self.recompute();
    }

    /// Overrides the confirmed bookmark flag with what the server reported.
    fn confirm_bookmarked(&mut self, bookmarked: bool) {
        self.confirmed.bookmarked = bookmarked;
        self.recompute();
    }

    fn confirm_read(&mut self) {
        self.confirmed.read = true;
        self.recompute();
    }

    fn recompute(&mut self) {
        let settled = self.writes.iter().take_while(|w| w.acknowledged).count();
        for write in self.writes.drain(..settled) {
            write.change.apply(&mut self.confirmed);
        }
        let mut flags = self.confirmed;
        for write in &self.writes {
            write.change.apply(&mut flags);
        }
        self.state.set_flags(flags);
    }
}

/// What a mutation did locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The change was applied and confirmed by the remote service.
    Applied,
    /// The same operation was already in flight for this article; nothing was sent.
    Debounced,
    /// The article was already in the requested state; nothing was sent.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("Sign in to like, bookmark or share articles")]
    Unauthenticated,
    #[error("{0:?} already in progress for this article")]
    InFlight(Operation),
    #[error("{0}")]
    Network(ApiError),
}

impl From<ApiError> for EngagementError {
    fn from(err: ApiError) -> Self {
        if err.is_unauthenticated() {
            EngagementError::Unauthenticated
        } else {
            EngagementError::Network(err)
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct EngagementController {
    remote: Arc<dyn EngagementService>,
    session: Session,
    entries: Mutex<HashMap<ArticleId, Entry>>,
    events: EventBus,
}

impl EngagementController {
    pub fn new(remote: Arc<dyn EngagementService>, session: Session, events: EventBus) -> Self {
        Self {
            remote,
            session,
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ArticleId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates default state for articles seen for the first time.
    ///
    /// Existing state is left untouched. Returns how many entries were created.
    pub fn register(&self, articles: &[Article]) -> usize {
        let mut entries = self.entries();
        let mut created = 0;
        for id in articles.iter().filter_map(Article::identity) {
            entries.entry(id).or_insert_with(|| {
                created += 1;
                Entry::default()
            });
        }
        created
    }

    pub fn state(&self, id: &ArticleId) -> Option<EngagementState> {
        self.entries().get(id).map(|entry| entry.state.clone())
    }

    pub fn tracked(&self) -> usize {
        self.entries().len()
    }

    pub fn snapshot(&self) -> HashMap<ArticleId, EngagementState> {
        self.entries()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect()
    }

    pub async fn like(&self, id: &ArticleId) -> Result<Outcome, EngagementError> {
        self.mutate(id, Operation::Like, Change::Like, self.remote.like(id))
            .await
    }

    pub async fn dislike(&self, id: &ArticleId) -> Result<Outcome, EngagementError> {
        self.mutate(id, Operation::Dislike, Change::Dislike, self.remote.dislike(id))
            .await
    }

    /// Bookmarks an article. The full payload is stored remotely so the
    /// bookmark list can be shown without refetching feeds.
    pub async fn bookmark(
        &self,
        id: &ArticleId,
        article: &Article,
    ) -> Result<Outcome, EngagementError> {
        self.mutate(
            id,
            Operation::Bookmark,
            Change::Bookmark(true),
            self.remote.bookmark(id, article),
        )
        .await
    }

    pub async fn unbookmark(&self, id: &ArticleId) -> Result<Outcome, EngagementError> {
        self.mutate(
            id,
            Operation::Bookmark,
            Change::Bookmark(false),
            self.remote.unbookmark(id),
        )
        .await
    }

    /// Flips the bookmark from the state the caller is displaying.
    ///
    /// The caller's view is taken as the server's state for this article
    /// unless a bookmark write is already in flight, so an article this
    /// controller never saw bookmarked can still be unbookmarked.
    pub async fn toggle_bookmark(
        &self,
        id: &ArticleId,
        article: &Article,
        currently_bookmarked: bool,
    ) -> Result<Outcome, EngagementError> {
        if !self.session.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }
        {
            let mut entries = self.entries();
            let entry = entries.entry(id.clone()).or_default();
            if !entry.state.is_pending(Operation::Bookmark) {
                entry.confirm_bookmarked(currently_bookmarked);
            }
        }

        if currently_bookmarked {
            self.unbookmark(id).await
        } else {
            self.bookmark(id, article).await
        }
    }

    /// Records the article in the reading history.
    ///
    /// Already-read articles are left alone. If the remote write fails the
    /// local `read` flag is reverted as well: the history feeds
    /// personalization, so the client must not claim a read the server
    /// never recorded.
    pub async fn mark_read(&self, id: &ArticleId) -> Result<Outcome, EngagementError> {
        self.mutate(id, Operation::Read, Change::Read, self.remote.record_read(id))
            .await
    }

    /// Fetches share links for an article. No flags change.
    pub async fn share(
        &self,
        id: &ArticleId,
        title: &str,
    ) -> Result<ShareLinks, EngagementError> {
        if !self.session.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }

        let guard = {
            let mut entries = self.entries();
            let entry = entries.entry(id.clone()).or_default();
            if !entry.state.pending.insert(Operation::Share) {
                return Err(EngagementError::InFlight(Operation::Share));
            }
            PendingGuard::new(self, id.clone(), Operation::Share, None)
        };

        let result = self.remote.share_links(id, title).await;
        guard.settle(true);
        result.map_err(|e| {
            tracing::warn!(article = %id, error = %e, "Share link generation failed");
            EngagementError::from(e)
        })
    }

    /// Replaces local bookmark flags with the server's bookmark list.
    ///
    /// Articles with a bookmark write in flight keep their optimistic flag.
    /// Returns the bookmarked articles for display.
    pub async fn sync_bookmarks(&self) -> Result<Vec<Article>, EngagementError> {
        if !self.session.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }

        let bookmarks = self.remote.bookmarks().await?;
        let saved: BTreeSet<ArticleId> = bookmarks.iter().filter_map(Article::identity).collect();

        let changed: Vec<(ArticleId, EngagementState)> = {
            let mut entries = self.entries();
            for id in &saved {
                entries.entry(id.clone()).or_default();
            }
            entries
                .iter_mut()
                .filter(|(_, entry)| !entry.state.is_pending(Operation::Bookmark))
                .filter_map(|(id, entry)| {
                    let bookmarked = saved.contains(id);
                    (entry.state.bookmarked != bookmarked).then(|| {
                        entry.confirm_bookmarked(bookmarked);
                        (id.clone(), entry.state.clone())
                    })
                })
                .collect()
        };

        tracing::debug!(
            bookmarks = saved.len(),
            changed = changed.len(),
            "Synchronized bookmarks"
        );
        for (article, state) in changed {
            self.events
                .publish(DeskEvent::EngagementChanged { article, state });
        }
        Ok(bookmarks)
    }

    /// Marks every article in the server's reading history as read.
    ///
    /// History only grows, so articles missing from it keep their flag.
    /// Returns the history in server order.
    pub async fn sync_read_history(&self) -> Result<Vec<ArticleId>, EngagementError> {
        if !self.session.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }

        let history = self.remote.recently_viewed().await?;
        let changed: Vec<(ArticleId, EngagementState)> = {
            let mut entries = self.entries();
            history
                .iter()
                .filter_map(|id| {
                    let entry = entries.entry(id.clone()).or_default();
                    (!entry.state.read).then(|| {
                        entry.confirm_read();
                        (id.clone(), entry.state.clone())
                    })
                })
                .collect()
        };

        tracing::debug!(
            history = history.len(),
            changed = changed.len(),
            "Synchronized reading history"
        );
        for (article, state) in changed {
            self.events
                .publish(DeskEvent::EngagementChanged { article, state });
        }
        Ok(history)
    }

    /// Optimistic write shared by every flag-changing operation.
    async fn mutate<Fut>(
        &self,
        id: &ArticleId,
        op: Operation,
        change: Change,
        call: Fut,
    ) -> Result<Outcome, EngagementError>
    where
        Fut: Future<Output = Result<(), ApiError>>,
    {
        if !self.session.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }

        let (guard, state) = {
            let mut entries = self.entries();
            let entry = entries.entry(id.clone()).or_default();
            if entry.state.is_pending(op) {
                tracing::debug!(article = %id, ?op, "Operation already pending, ignoring");
                return Ok(Outcome::Debounced);
            }

            let mut target = entry.state.flags();
            change.apply(&mut target);
            if target == entry.state.flags() {
                return Ok(Outcome::Unchanged);
            }

            let seq = entry.begin(change);
            entry.state.pending.insert(op);
            let guard = PendingGuard::new(self, id.clone(), op, Some(seq));
            (guard, entry.state.clone())
        };
        self.events.publish(DeskEvent::EngagementChanged {
            article: id.clone(),
            state,
        });

        match call.await {
            Ok(()) => {
                let state = guard.settle(true);
                self.events.publish(DeskEvent::EngagementChanged {
                    article: id.clone(),
                    state,
                });
                Ok(Outcome::Applied)
            }
            Err(e) => {
                tracing::warn!(article = %id, ?op, error = %e, "Engagement write failed, rolling back");
                let state = guard.settle(false);
                self.events.publish(DeskEvent::EngagementFailed {
                    article: id.clone(),
                    operation: op,
                    error: e.to_string().into(),
                });
                self.events.publish(DeskEvent::EngagementChanged {
                    article: id.clone(),
                    state,
                });
                Err(e.into())
            }
        }
    }
}

/// Clears a pending marker exactly once: through [`PendingGuard::settle`]
/// when the call completes, or on drop if the caller's future is cancelled.
///
/// A cancelled write keeps its flags: whether the server applied it is
/// unknown, so it is treated as acknowledged.
struct PendingGuard<'a> {
    controller: &'a EngagementController,
    id: ArticleId,
    op: Operation,
    write: Option<u64>,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(
        controller: &'a EngagementController,
        id: ArticleId,
        op: Operation,
        write: Option<u64>,
    ) -> Self {
        Self {
            controller,
            id,
            op,
            write,
            armed: true,
        }
    }

    /// Clears the marker, acknowledging or discarding the write, and
    /// returns the resulting state.
    fn settle(mut self, succeeded: bool) -> EngagementState {
        self.armed = false;
        let mut entries = self.controller.entries();
        let entry = entries.entry(self.id.clone()).or_default();
        self.release(entry, succeeded);
        entry.state.clone()
    }

    fn release(&self, entry: &mut Entry, acknowledged: bool) {
        entry.state.pending.remove(&self.op);
        if let Some(seq) = self.write {
            entry.finish(seq, acknowledged);
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(article = %self.id, op = ?self.op, "Pending operation abandoned");
            if let Some(entry) = self.controller.entries().get_mut(&self.id) {
                self.release(entry, true);
            }
        }
    }
}
