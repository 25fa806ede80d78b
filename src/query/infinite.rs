//! Infinite-scroll fetcher over a single book source.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{QueryFetcher, SearchSession};
use crate::models::{PageRequest, ResultPage, DEFAULT_PAGE_SIZE};
use crate::sources::{BookSource, SourceError};
use crate::utils::{CacheResult, PageCache};

/// A finished fetch, tagged with the generation that started it
#[derive(Debug)]
struct Completion {
    generation: u64,
    request: PageRequest,
    result: Result<ResultPage, SourceError>,
}

#[derive(Debug)]
struct InFlight {
    page: u32,
    handle: JoinHandle<()>,
}

/// Paginated fetcher keyed by query text.
///
/// - one fetch at a time; `fetch_next_page` while fetching is a no-op
/// - switching queries parks the old session in a small in-memory cache and
///   restores it if the user comes back to the same text
/// - every query switch bumps a generation counter; completions from an
///   older generation are dropped, so a slow response for "dun" can never
///   land in the session for "dune"
///
/// Fetches run on spawned tokio tasks. Outside a tokio runtime no fetch
/// starts and the failure is reported through `last_error`.
#[derive(Debug)]
pub struct InfiniteQuery {
    source: Arc<dyn BookSource>,
    cache: Option<PageCache>,
    page_size: usize,
    max_sessions: usize,
    session: Option<SearchSession>,
    parked: VecDeque<SearchSession>,
    generation: u64,
    in_flight: Option<InFlight>,
    last_error: Option<SourceError>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl InfiniteQuery {
    pub fn new(source: Arc<dyn BookSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            cache: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_sessions: 8,
            session: None,
            parked: VecDeque::new(),
            generation: 0,
            in_flight: None,
            last_error: None,
            tx,
            rx,
        }
    }

    /// Records requested per page
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// How many previous queries keep their pages; 0 always refetches
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Read and fill a disk page cache
    pub fn with_cache(mut self, cache: PageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &Arc<dyn BookSource> {
        &self.source
    }

    /// The current session, if a query has been set
    pub fn session(&self) -> Option<&SearchSession> {
        self.session.as_ref()
    }

    fn park(&mut self, session: SearchSession) {
        if self.max_sessions == 0 || session.pages().is_empty() {
            return;
        }
        self.parked.retain(|s| s.query() != session.query());
        self.parked.push_back(session);
        while self.parked.len() > self.max_sessions {
            if let Some(evicted) = self.parked.pop_front() {
                tracing::debug!("Evicting cached session for {:?}", evicted.query());
            }
        }
    }

    fn unpark(&mut self, query: &str) -> Option<SearchSession> {
        let index = self.parked.iter().position(|s| s.query() == query)?;
        self.parked.remove(index)
    }

    fn abandon_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!("Abandoning in-flight fetch of page {}", in_flight.page);
            in_flight.handle.abort();
        }
    }

    fn start_fetch(&mut self, page: u32) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                "Cannot fetch page {} of {:?}: no tokio runtime",
                page,
                session.query()
            );
            self.last_error = Some(SourceError::Other("no tokio runtime".to_string()));
            return;
        };

        let request = PageRequest {
            query: session.query().to_string(),
            page,
            page_size: self.page_size,
        };
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        let tx = self.tx.clone();

        tracing::debug!(
            "Fetching page {} of {:?} from {}",
            page,
            request.query,
            source.id()
        );

        let handle = runtime.spawn(async move {
            let result = fetch_page(source.as_ref(), cache.as_ref(), &request).await;
            // The receiver lives as long as the fetcher; a closed channel
            // just means nobody is waiting for this page any more.
            let _ = tx.send(Completion {
                generation,
                request,
                result,
            });
        });

        self.in_flight = Some(InFlight { page, handle });
    }

    /// Merge one completion. Returns true if visible state changed.
    fn apply(&mut self, completion: Completion) -> bool {
        if completion.generation != self.generation {
            tracing::debug!(
                "Dropping stale page {} for {:?}",
                completion.request.page,
                completion.request.query
            );
            return false;
        }

        self.in_flight = None;

        match completion.result {
            Ok(page) => {
                let Some(session) = self.session.as_mut() else {
                    return false;
                };
                let count = page.len();
                let number = page.page;
                if session.push(page) {
                    self.last_error = None;
                    tracing::info!(
                        "Loaded page {} of {:?} ({} books, {} total)",
                        number,
                        session.query(),
                        count,
                        session.len()
                    );
                } else {
                    tracing::debug!(
                        "Ignoring out-of-order page {} for {:?}",
                        number,
                        session.query()
                    );
                }
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to fetch page {} of {:?}: {}",
                    completion.request.page,
                    completion.request.query,
                    error
                );
                self.last_error = Some(error);
            }
        }

        true
    }
}

async fn fetch_page(
    source: &dyn BookSource,
    cache: Option<&PageCache>,
    request: &PageRequest,
) -> Result<ResultPage, SourceError> {
    if let Some(cache) = cache {
        match cache.get_page(source.id(), request) {
            CacheResult::Hit(page) => return Ok(page),
            CacheResult::Expired | CacheResult::Miss => {}
        }
    }

    let page = source.search_page(request).await?;

    if let Some(cache) = cache {
        cache.set_page(source.id(), request, &page);
    }

    Ok(page)
}

enum Wake {
    Message(Option<Completion>),
    TaskDone,
}

#[async_trait]
impl QueryFetcher for InfiniteQuery {
    fn set_query(&mut self, query: &str) {
        if self.session.as_ref().is_some_and(|s| s.query() == query) {
            return;
        }

        self.generation += 1;
        self.abandon_in_flight();
        self.last_error = None;

        if let Some(previous) = self.session.take() {
            self.park(previous);
        }

        let session = self.unpark(query).unwrap_or_else(|| SearchSession::new(query));
        let restored = !session.pages().is_empty();
        self.session = Some(session);

        if restored {
            tracing::debug!("Restored cached session for {:?}", query);
        } else {
            self.start_fetch(1);
        }
    }

    fn query(&self) -> &str {
        self.session.as_ref().map_or("", SearchSession::query)
    }

    fn pages(&self) -> &[ResultPage] {
        self.session
            .as_ref()
            .map(SearchSession::pages)
            .unwrap_or(&[])
    }

    fn has_next_page(&self) -> bool {
        self.session
            .as_ref()
            .and_then(SearchSession::next_page)
            .is_some()
    }

    fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    fn fetch_next_page(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let Some(next) = self.session.as_ref().and_then(SearchSession::next_page) else {
            return false;
        };
        self.start_fetch(next);
        true
    }

    fn poll(&mut self) -> bool {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.handle.is_finished());

        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            changed |= self.apply(completion);
        }

        // A task that finished without reporting back panicked.
        if finished {
            if let Some(in_flight) = self.in_flight.take() {
                tracing::warn!("Fetch task for page {} ended without a result", in_flight.page);
                self.last_error = Some(SourceError::Other("fetch task failed".to_string()));
                changed = true;
            }
        }

        changed
    }

    async fn wait_for_update(&mut self) -> bool {
        if self.poll() {
            return true;
        }

        loop {
            let wake = {
                let Some(in_flight) = self.in_flight.as_mut() else {
                    return false;
                };
                tokio::select! {
                    message = self.rx.recv() => Wake::Message(message),
                    _ = &mut in_flight.handle => Wake::TaskDone,
                }
            };

            match wake {
                Wake::Message(Some(completion)) => {
                    if self.apply(completion) {
                        return true;
                    }
                }
                Wake::Message(None) => return false,
                Wake::TaskDone => return self.poll(),
            }
        }
    }

    fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }
}

impl Drop for InfiniteQuery {
    fn drop(&mut self) {
        self.abandon_in_flight();
    }
}
