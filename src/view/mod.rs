//! The search results list of the "find a book" step.
//!
//! [`SearchResultsList`] is headless: it owns no widgets, it decides what
//! should be on screen. Hosts call [`SearchResultsList::render`] after every
//! change and draw the returned [`ResultsView`], then feed user input back
//! through [`SearchResultsList::select`],
//! [`SearchResultsList::enter_title_manually`] and
//! [`SearchResultsList::on_sentinel_visible`].
//!
//! The list shows one of two views:
//!
//! - while a fetch is in flight or once anything was found, the titled list
//!   of every record fetched so far, in fetch order, followed by a sentinel
//!   when the fetcher reports more pages
//! - once loading settled with nothing found, an empty state with a button
//!   that copies the query into the form title and closes the search

use std::fmt;
use std::sync::Arc;

use crate::models::BookRecord;
use crate::query::QueryFetcher;
use crate::store::FormStore;
use crate::viewport::{SentinelId, Subscription, Viewport};

/// Heading of the results list
pub const RESULTS_TITLE: &str = "Search results";

/// Text of the empty state
pub const EMPTY_MESSAGE: &str = "No search results";

/// Alt text of the empty state illustration
pub const EMPTY_ILLUSTRATION_ALT: &str = "No search results illustration";

/// Label of the manual-entry button
pub const MANUAL_ENTRY_LABEL: &str = "Enter book title manually";

/// Errors from acting on the list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("No result at index {index} ({len} results shown)")]
    NoSuchItem { index: usize, len: usize },

    #[error("No results are listed")]
    NotListed,

    #[error("Manual entry is only offered when the search found nothing")]
    ManualEntryUnavailable,
}

/// Caller-facing inputs of the list
pub struct SearchResultsProps {
    pub query: String,
    /// Receives the record the user selected
    pub on_change: Box<dyn FnMut(BookRecord) + Send>,
    /// Closes the search overlay
    pub handle_close: Box<dyn FnMut() + Send>,
}

impl SearchResultsProps {
    /// Props with callbacks that do nothing
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            on_change: Box::new(|_| {}),
            handle_close: Box::new(|| {}),
        }
    }

    pub fn on_change(mut self, f: impl FnMut(BookRecord) + Send + 'static) -> Self {
        self.on_change = Box::new(f);
        self
    }

    pub fn handle_close(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.handle_close = Box::new(f);
        self
    }
}

impl fmt::Debug for SearchResultsProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResultsProps")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Which of the two views the list shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    LoadingOrHasResults,
    EmptyAfterLoad,
}

/// What the host should draw
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView<'a> {
    Empty(EmptyState),
    List(ListView<'a>),
}

impl ResultsView<'_> {
    pub fn is_empty_state(&self) -> bool {
        matches!(self, ResultsView::Empty(_))
    }
}

/// The titled results list
#[derive(Debug, Clone, PartialEq)]
pub struct ListView<'a> {
    pub title: &'static str,
    /// Every fetched record, in fetch order
    pub items: Vec<&'a BookRecord>,
    /// A fetch is in flight
    pub loading: bool,
    /// Trailing sentinel, present iff more pages exist
    pub sentinel: Option<SentinelId>,
}

/// The nothing-found fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyState {
    pub message: &'static str,
    pub illustration_alt: &'static str,
    pub button_label: &'static str,
}

impl Default for EmptyState {
    fn default() -> Self {
        Self {
            message: EMPTY_MESSAGE,
            illustration_alt: EMPTY_ILLUSTRATION_ALT,
            button_label: MANUAL_ENTRY_LABEL,
        }
    }
}

/// A sentinel instance at the end of the list
#[derive(Debug)]
struct MountedSentinel {
    id: SentinelId,
    /// None once the one-shot observation fired
    subscription: Option<Subscription>,
    /// List length when this instance was mounted
    mounted_at: usize,
}

/// Headless results list for a book search
pub struct SearchResultsList<F: QueryFetcher> {
    fetcher: F,
    store: Arc<dyn FormStore>,
    viewport: Arc<dyn Viewport>,
    query: String,
    on_change: Box<dyn FnMut(BookRecord) + Send>,
    handle_close: Box<dyn FnMut() + Send>,
    sentinel: Option<MountedSentinel>,
}

impl<F: QueryFetcher> SearchResultsList<F> {
    /// Mount the list: hand the query to the fetcher.
    pub fn mount(
        props: SearchResultsProps,
        mut fetcher: F,
        store: Arc<dyn FormStore>,
        viewport: Arc<dyn Viewport>,
    ) -> Self {
        let SearchResultsProps {
            query,
            on_change,
            handle_close,
        } = props;

        tracing::debug!("Mounting results list for {:?}", query);
        fetcher.set_query(&query);

        Self {
            fetcher,
            store,
            viewport,
            query,
            on_change,
            handle_close,
            sentinel: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Change the query. The current session is left behind and the fetcher
    /// starts over for the new text; the same text is a no-op.
    pub fn set_query(&mut self, query: &str) {
        if self.query == query {
            return;
        }
        tracing::debug!("Query changed from {:?} to {:?}", self.query, query);
        self.unmount_sentinel();
        self.query = query.to_string();
        self.fetcher.set_query(query);
    }

    fn item_count(&self) -> usize {
        self.fetcher.pages().iter().map(|page| page.len()).sum()
    }

    fn items(&self) -> impl Iterator<Item = &BookRecord> {
        self.fetcher.pages().iter().flat_map(|page| page.books.iter())
    }

    pub fn state(&self) -> ListState {
        if !self.fetcher.is_fetching() && self.item_count() == 0 {
            ListState::EmptyAfterLoad
        } else {
            ListState::LoadingOrHasResults
        }
    }

    /// The id of the mounted sentinel, if any
    pub fn sentinel(&self) -> Option<SentinelId> {
        self.sentinel.as_ref().map(|s| s.id)
    }

    fn unmount_sentinel(&mut self) {
        if let Some(sentinel) = self.sentinel.take() {
            tracing::debug!("Unmounting {}", sentinel.id);
            if let Some(subscription) = sentinel.subscription {
                subscription.cancel();
            }
        }
    }

    fn mount_sentinel(&mut self, len: usize) {
        self.unmount_sentinel();
        let id = self.viewport.mount();
        let subscription = self.viewport.subscribe(id);
        tracing::debug!("Mounted {} after {} results", id, len);
        self.sentinel = Some(MountedSentinel {
            id,
            subscription: Some(subscription),
            mounted_at: len,
        });
    }

    /// Bring the sentinel in line with the fetcher.
    ///
    /// A new instance replaces the old one when the list length changed, or
    /// when the old one already fired and the fetcher went idle without the
    /// list growing (a failed page). Either way the new instance can trigger
    /// on its own if it is still on screen.
    fn reconcile_sentinel(&mut self) {
        if self.state() == ListState::EmptyAfterLoad || !self.fetcher.has_next_page() {
            self.unmount_sentinel();
            return;
        }

        let len = self.item_count();
        let idle = !self.fetcher.is_fetching();
        let stale = match &self.sentinel {
            None => true,
            Some(sentinel) => {
                sentinel.mounted_at != len || (sentinel.subscription.is_none() && idle)
            }
        };
        if stale {
            self.mount_sentinel(len);
        }
    }

    /// Decide what to draw. Mounts or unmounts the sentinel as needed.
    pub fn render(&mut self) -> ResultsView<'_> {
        self.reconcile_sentinel();

        match self.state() {
            ListState::EmptyAfterLoad => ResultsView::Empty(EmptyState::default()),
            ListState::LoadingOrHasResults => ResultsView::List(ListView {
                title: RESULTS_TITLE,
                items: self.items().collect(),
                loading: self.fetcher.is_fetching(),
                sentinel: self.sentinel(),
            }),
        }
    }

    /// The viewport reports `id` on screen.
    ///
    /// Only the mounted, still observed sentinel counts. Its observation is
    /// cancelled first; then the next page is requested if there is one and
    /// nothing is in flight. Returns whether a fetch was requested.
    pub fn on_sentinel_visible(&mut self, id: SentinelId) -> bool {
        let Some(subscription) = self
            .sentinel
            .as_mut()
            .filter(|s| s.id == id)
            .and_then(|s| s.subscription.take())
        else {
            tracing::trace!("Ignoring visibility of {}", id);
            return false;
        };
        subscription.cancel();

        if self.fetcher.has_next_page() && !self.fetcher.is_fetching() {
            tracing::debug!("{} visible, fetching next page", id);
            self.fetcher.fetch_next_page()
        } else {
            tracing::debug!("{} visible while fetching, dropped", id);
            false
        }
    }

    /// The user picked the record at `index`. Passes a copy to `on_change`.
    pub fn select(&mut self, index: usize) -> Result<(), ViewError> {
        if self.state() == ListState::EmptyAfterLoad {
            return Err(ViewError::NotListed);
        }
        let book = self
            .items()
            .nth(index)
            .cloned()
            .ok_or_else(|| ViewError::NoSuchItem {
                index,
                len: self.item_count(),
            })?;

        tracing::debug!("Selected {:?} at {}", book.title, index);
        (self.on_change)(book);
        Ok(())
    }

    /// The empty state's button: title the form after the query, then close.
    pub fn enter_title_manually(&mut self) -> Result<(), ViewError> {
        if self.state() != ListState::EmptyAfterLoad {
            return Err(ViewError::ManualEntryUnavailable);
        }
        self.store.post_title(&self.query);
        (self.handle_close)();
        Ok(())
    }

    /// Apply finished fetches. Returns true if the view needs redrawing.
    pub fn sync(&mut self) -> bool {
        let changed = self.fetcher.poll();
        if changed {
            self.reconcile_sentinel();
        }
        changed
    }

    /// Wait for the in-flight fetch and apply it. Returns false right away
    /// when nothing is in flight.
    pub async fn wait_for_update(&mut self) -> bool {
        let changed = self.fetcher.wait_for_update().await;
        if changed {
            self.reconcile_sentinel();
        }
        changed
    }
}

impl<F: QueryFetcher + fmt::Debug> fmt::Debug for SearchResultsList<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResultsList")
            .field("query", &self.query)
            .field("fetcher", &self.fetcher)
            .field("sentinel", &self.sentinel)
            .finish_non_exhaustive()
    }
}
