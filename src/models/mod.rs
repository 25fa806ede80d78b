//! Core data models for book records and paginated search.

mod book;
mod page;

pub use book::{BookBuilder, BookRecord, Provider};
pub use page::{PageRequest, ResultPage, DEFAULT_PAGE_SIZE};
