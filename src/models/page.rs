//! Page request and result page models.

use serde::{Deserialize, Serialize};

use super::BookRecord;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A request for one page of search results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Search text, passed to the provider as-is
    pub query: String,

    /// 1-based page number
    pub page: u32,

    /// Maximum number of records on the page
    pub page_size: usize,
}

impl PageRequest {
    /// Request the first page of `query`
    pub fn first(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the page number
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Set the page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }
}

/// One batch of records produced by a single fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPage {
    /// 1-based page number this batch answers
    pub page: u32,

    /// Records in provider order
    pub books: Vec<BookRecord>,

    /// Whether the provider reported this as the final page
    pub is_last: bool,

    /// Total number of matches, when the provider reports it
    pub total: Option<usize>,
}

impl ResultPage {
    /// Create a page that is assumed to be final until told otherwise
    pub fn new(page: u32, books: Vec<BookRecord>) -> Self {
        Self {
            page,
            books,
            is_last: true,
            total: None,
        }
    }

    /// Set the last-page flag
    pub fn is_last(mut self, is_last: bool) -> Self {
        self.is_last = is_last;
        self
    }

    /// Set the total match count
    pub fn total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// The page number to request next, if there is one
    pub fn next_page(&self) -> Option<u32> {
        (!self.is_last).then(|| self.page + 1)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
