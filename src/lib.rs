//! # Book Finder
//!
//! The "find a book" step of a writing app: search book providers, scroll
//! through the results page by page, and pick a book (or fall back to typing
//! the title) for the write form.
//!
//! ## Architecture
//!
//! - [`view`]: the headless search results list and its two views
//! - [`query`]: paginated, query-keyed fetching ([`query::InfiniteQuery`])
//! - [`viewport`]: sentinel visibility as subscribe/cancel handles
//! - [`store`]: the write form the list posts its title into
//! - [`sources`]: book provider plugins (Open Library, Kakao)
//! - [`models`]: book records and result pages
//! - [`utils`]: HTTP client, retry with backoff and the page cache
//! - [`ui`]: terminal rendering
//! - [`config`]: configuration management

pub mod config;
pub mod models;
pub mod query;
pub mod sources;
pub mod store;
pub mod ui;
pub mod utils;
pub mod view;
pub mod viewport;

// Re-export commonly used types
pub use models::{BookRecord, ResultPage};
pub use query::{InfiniteQuery, QueryFetcher};
pub use sources::{BookSource, SourceRegistry};
pub use store::{FormStore, WriteStore};
pub use view::{SearchResultsList, SearchResultsProps};
pub use viewport::{Viewport, VisibilityTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
