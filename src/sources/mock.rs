//! Mock source for tests and offline demos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{BookRecord, PageRequest, Provider, ResultPage};
use crate::sources::{BookSource, SourceError};

#[derive(Debug, Default)]
struct MockState {
    /// Scripted results keyed by query text
    catalog: HashMap<String, Vec<Result<ResultPage, SourceError>>>,
    /// Every request served, in order
    calls: Vec<PageRequest>,
}

/// A source that serves scripted pages.
///
/// Queries without a script answer with an empty final page, which is how
/// an unknown title looks at a real provider.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    delay: Option<Duration>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to keep fetches in flight during tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the pages for a query, in page order.
    pub fn set_pages(&self, query: &str, pages: Vec<ResultPage>) {
        self.state()
            .catalog
            .insert(query.to_string(), pages.into_iter().map(Ok).collect());
    }

    /// Make page `page` of `query` fail with `error`.
    pub fn fail_page(&self, query: &str, page: u32, error: SourceError) {
        let mut state = self.state();
        let pages = state.catalog.entry(query.to_string()).or_default();
        let index = page.saturating_sub(1) as usize;
        if pages.len() <= index {
            pages.resize_with(index + 1, || Ok(ResultPage::new(0, Vec::new())));
        }
        pages[index] = Err(error);
    }

    /// Requests served so far.
    pub fn calls(&self) -> Vec<PageRequest> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }
}

#[async_trait]
impl BookSource for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search_page(&self, request: &PageRequest) -> Result<ResultPage, SourceError> {
        let scripted = {
            let mut state = self.state();
            state.calls.push(request.clone());
            state
                .catalog
                .get(&request.query)
                .and_then(|pages| pages.get(request.page.saturating_sub(1) as usize))
                .cloned()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Ok(page)) => Ok(ResultPage {
                page: request.page,
                ..page
            }),
            Some(Err(error)) => Err(error),
            None => Ok(ResultPage::new(request.page, Vec::new())),
        }
    }
}

/// Helper to create a mock book for testing.
pub fn make_book(id: &str, title: &str) -> BookRecord {
    BookRecord::new(id, title, Provider::Other("mock".to_string()))
}

/// Split `books` into pages of `page_size`; all but the last report more.
pub fn paginate(books: Vec<BookRecord>, page_size: usize) -> Vec<ResultPage> {
    let total = books.len();
    let chunks: Vec<Vec<BookRecord>> = books
        .chunks(page_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect();
    let count = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            ResultPage::new(i as u32 + 1, chunk)
                .is_last(i + 1 == count)
                .total(total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_pages() {
        let source = MockSource::new();
        let books = (1..=5)
            .map(|i| make_book(&i.to_string(), &format!("Book {}", i)))
            .collect();
        source.set_pages("dune", paginate(books, 2));

        let first = source.search_page(&PageRequest::first("dune")).await.unwrap();
        assert_eq!(first.books.len(), 2);
        assert_eq!(first.next_page(), Some(2));

        let last = source
            .search_page(&PageRequest::first("dune").page(3))
            .await
            .unwrap();
        assert_eq!(last.books.len(), 1);
        assert!(last.is_last);

        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_query_is_empty() {
        let source = MockSource::new();
        let page = source.search_page(&PageRequest::first("nothing")).await.unwrap();
        assert!(page.is_empty());
        assert!(page.is_last);
    }

    #[tokio::test]
    async fn test_failed_page() {
        let source = MockSource::new();
        source.set_pages("dune", paginate(vec![make_book("1", "Dune")], 1));
        source.fail_page("dune", 2, SourceError::RateLimit);

        assert!(source.search_page(&PageRequest::first("dune")).await.is_ok());
        let result = source.search_page(&PageRequest::first("dune").page(2)).await;
        assert!(matches!(result, Err(SourceError::RateLimit)));
    }
}
