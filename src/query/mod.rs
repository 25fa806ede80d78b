//! Paginated, query-keyed fetching of result pages.
//!
//! The results list never talks to a [`BookSource`](crate::sources::BookSource)
//! directly. It drives a [`QueryFetcher`]: hand it the query text, read the
//! pages fetched so far, and ask for the next page when the user scrolls to
//! the end. Completions are applied when the owner calls
//! [`QueryFetcher::poll`] or awaits [`QueryFetcher::wait_for_update`], so all
//! state changes happen on the owner's task.

mod infinite;

pub use infinite::InfiniteQuery;

use async_trait::async_trait;

use crate::models::{BookRecord, ResultPage};
use crate::sources::SourceError;

/// Reactive view of a paginated search
#[async_trait]
pub trait QueryFetcher: Send {
    /// Switch to `query`, starting its first page unless it is already loaded.
    /// Setting the current query again does nothing.
    fn set_query(&mut self, query: &str);

    /// The query the pages belong to
    fn query(&self) -> &str;

    /// Pages fetched for the current query, in fetch order
    fn pages(&self) -> &[ResultPage];

    /// Whether the last fetched page reports a successor
    fn has_next_page(&self) -> bool;

    /// Whether a fetch for the current query is in flight
    fn is_fetching(&self) -> bool;

    /// Request the next page. Returns false (and does nothing) while a fetch
    /// is in flight or when there is no next page.
    fn fetch_next_page(&mut self) -> bool;

    /// Apply finished fetches without waiting. Returns true if state changed.
    fn poll(&mut self) -> bool;

    /// Wait until the in-flight fetch finishes and apply it. Returns false
    /// immediately when nothing is in flight.
    async fn wait_for_update(&mut self) -> bool;

    /// Error from the most recent fetch for the current query, if it failed
    fn last_error(&self) -> Option<&SourceError>;
}

/// The pages fetched so far for one query
///
/// Pages only ever get appended, and only in page order.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    query: String,
    pages: Vec<ResultPage>,
}

impl SearchSession {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            pages: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn pages(&self) -> &[ResultPage] {
        &self.pages
    }

    /// Flattened records across all pages, in fetch order
    pub fn books(&self) -> impl Iterator<Item = &BookRecord> {
        self.pages.iter().flat_map(|page| page.books.iter())
    }

    /// Number of records across all pages
    pub fn len(&self) -> usize {
        self.pages.iter().map(ResultPage::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Page number the session expects next; page 1 when nothing is loaded
    pub fn expected_page(&self) -> u32 {
        self.pages.len() as u32 + 1
    }

    /// The next page to request, if the last page reports one
    pub fn next_page(&self) -> Option<u32> {
        self.pages.last().and_then(ResultPage::next_page)
    }

    /// Append `page` if it is the one the session expects.
    pub fn push(&mut self, page: ResultPage) -> bool {
        if page.page != self.expected_page() {
            return false;
        }
        self.pages.push(page);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{make_book, paginate};

    #[test]
    fn test_session_appends_in_order() {
        let pages = paginate(
            vec![make_book("1", "A"), make_book("2", "B"), make_book("3", "C")],
            2,
        );
        let mut session = SearchSession::new("abc");
        assert_eq!(session.expected_page(), 1);
        assert_eq!(session.next_page(), None);

        // Page 2 before page 1 is refused
        assert!(!session.push(pages[1].clone()));
        assert!(session.push(pages[0].clone()));
        assert_eq!(session.next_page(), Some(2));
        assert!(session.push(pages[1].clone()));
        assert_eq!(session.next_page(), None);

        let titles: Vec<_> = session.books().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(session.len(), 3);
    }
}
