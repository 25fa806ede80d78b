//! Book search providers behind a common trait.
//!
//! This module defines the [`BookSource`] trait that every provider implements.
//! A source answers one question: "give me page N of the matches for this
//! text". Pagination state, caching and de-duplication of in-flight requests
//! live one layer up in [`crate::query`].
//!
//! # Available Sources
//!
//! - `openlibrary` - Open Library search API (no key needed, default)
//! - `kakao` - Kakao book search (requires `KAKAO_REST_API_KEY`)
//!
//! [`MockSource`] serves scripted pages for tests and offline demos.

mod kakao;
pub mod mock;
mod open_library;
mod registry;

pub use kakao::KakaoSource;
pub use mock::MockSource;
pub use open_library::OpenLibrarySource;
pub use registry::SourceRegistry;

use crate::models::{PageRequest, ResultPage};
use async_trait::async_trait;

/// The BookSource trait defines the interface for all book providers.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `BookSource`
/// 2. Implement `id`, `name` and `search_page`
/// 3. Register it in `SourceRegistry::from_config()` or with `register()`
#[async_trait]
pub trait BookSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "openlibrary")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Fetch one page of matches for the request
    async fn search_page(&self, request: &PageRequest) -> Result<ResultPage, SourceError>;

    /// Reject queries the provider cannot answer before touching the network
    fn validate_query(&self, query: &str) -> Result<(), SourceError> {
        if query.trim().is_empty() {
            return Err(SourceError::InvalidRequest(
                "search text must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Source or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the provider
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Map a non-success HTTP status to the matching error
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode) -> SourceError {
    match status.as_u16() {
        401 | 403 => SourceError::Auth(format!("{} rejected the credentials ({})", provider, status)),
        429 => SourceError::RateLimit,
        400 => SourceError::InvalidRequest(format!("{} rejected the request ({})", provider, status)),
        _ => SourceError::Api(format!("{} API returned status: {}", provider, status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        use reqwest::StatusCode;

        assert!(matches!(
            status_error("Kakao", StatusCode::UNAUTHORIZED),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            status_error("Kakao", StatusCode::TOO_MANY_REQUESTS),
            SourceError::RateLimit
        ));
        assert!(matches!(
            status_error("Kakao", StatusCode::BAD_REQUEST),
            SourceError::InvalidRequest(_)
        ));
        assert!(matches!(
            status_error("Kakao", StatusCode::SERVICE_UNAVAILABLE),
            SourceError::Api(_)
        ));
    }

    #[test]
    fn test_validate_blank_query() {
        let source = MockSource::new();
        assert!(source.validate_query("dune").is_ok());
        assert!(matches!(
            source.validate_query("   "),
            Err(SourceError::InvalidRequest(_))
        ));
    }
}
