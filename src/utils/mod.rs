//! Utility modules supporting book search.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts and a user agent
//! - [`with_retry`]: execute an operation with retry on transient errors
//! - [`PageCache`]: disk cache for result pages
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use book_finder::sources::SourceError;
//! use book_finder::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod http;
mod retry;

pub use cache::{CacheResult, CacheStats, PageCache};
pub use http::{default_user_agent, HttpClient};
pub use retry::{interactive_retry_config, with_retry, RetryConfig, TransientError};
