//! Open Library book source.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{BookBuilder, BookRecord, PageRequest, Provider, ResultPage};
use crate::sources::{status_error, BookSource, SourceError};
use crate::utils::{interactive_retry_config, with_retry, HttpClient};

const OPEN_LIBRARY_API_BASE: &str = "https://openlibrary.org";
const COVERS_BASE: &str = "https://covers.openlibrary.org/b/id";
const SEARCH_FIELDS: &str = "key,title,author_name,isbn,cover_i,first_publish_year,publisher";

/// Open Library source
///
/// Uses the public `search.json` endpoint, which needs no API key.
#[derive(Debug, Clone)]
pub struct OpenLibrarySource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl OpenLibrarySource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, OPEN_LIBRARY_API_BASE)
    }

    /// Point the source at another host (mirrors, tests)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, request: &PageRequest) -> String {
        format!(
            "{}/search.json?q={}&page={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(request.query.trim()),
            request.page,
            request.page_size,
            SEARCH_FIELDS
        )
    }

    fn to_record(&self, doc: OLDoc) -> Option<BookRecord> {
        let title = doc.title.filter(|t| !t.trim().is_empty())?;
        let id = doc
            .isbn
            .first()
            .cloned()
            .or_else(|| doc.key.clone())
            .unwrap_or_else(|| title.clone());

        let mut builder = BookBuilder::new(id, title, Provider::OpenLibrary).authors(doc.author_name);

        if let Some(cover) = doc.cover_i {
            builder = builder.cover_url(format!("{}/{}-M.jpg", COVERS_BASE, cover));
        }
        if let Some(publisher) = doc.publisher.into_iter().next() {
            builder = builder.publisher(publisher);
        }
        if let Some(year) = doc.first_publish_year {
            builder = builder.published(year.to_string());
        }
        if let Some(key) = doc.key {
            builder = builder.url(format!("{}{}", self.base_url, key));
        }

        Some(builder.build())
    }
}

#[async_trait]
impl BookSource for OpenLibrarySource {
    fn id(&self) -> &str {
        "openlibrary"
    }

    fn name(&self) -> &str {
        "Open Library"
    }

    async fn search_page(&self, request: &PageRequest) -> Result<ResultPage, SourceError> {
        self.validate_query(&request.query)?;

        let url = self.search_url(request);
        let client = Arc::clone(&self.client);

        let response = with_retry(interactive_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    SourceError::Network(format!("Failed to search Open Library: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("Open Library", response.status()));
                }

                Ok(response)
            }
        })
        .await?;

        let data: OLResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let returned = data.docs.len();
        let seen = data.start + returned;
        let is_last = returned < request.page_size || seen >= data.num_found;

        let books = data
            .docs
            .into_iter()
            .filter_map(|doc| self.to_record(doc))
            .collect();

        Ok(ResultPage::new(request.page, books)
            .is_last(is_last)
            .total(data.num_found))
    }
}

// ===== Open Library API Types =====

#[derive(Debug, Deserialize)]
struct OLResponse {
    #[serde(rename = "numFound", default)]
    num_found: usize,
    #[serde(default)]
    start: usize,
    #[serde(default)]
    docs: Vec<OLDoc>,
}

#[derive(Debug, Deserialize)]
struct OLDoc {
    key: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    isbn: Vec<String>,
    cover_i: Option<i64>,
    first_publish_year: Option<i32>,
    #[serde(default)]
    publisher: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn source_for(server: &mockito::ServerGuard) -> OpenLibrarySource {
        let client = Arc::new(HttpClient::new().unwrap());
        OpenLibrarySource::with_base_url(client, server.url())
    }

    #[tokio::test]
    async fn test_search_page_maps_docs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "dune".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "numFound": 5,
                    "start": 0,
                    "docs": [
                        {
                            "key": "/works/OL893415W",
                            "title": "Dune",
                            "author_name": ["Frank Herbert"],
                            "isbn": ["9780441013593", "0441013597"],
                            "cover_i": 11481354,
                            "first_publish_year": 1965,
                            "publisher": ["Ace Books", "Chilton"]
                        },
                        {
                            "key": "/works/OL893416W",
                            "title": "Dune Messiah",
                            "author_name": ["Frank Herbert"]
                        }
                    ]
                }"#,
            )
            .create_async()
            .await;

        let source = source_for(&server);
        let page = source
            .search_page(&PageRequest::first("dune").page_size(2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.page, 1);
        assert_eq!(page.total, Some(5));
        assert!(!page.is_last);
        assert_eq!(page.next_page(), Some(2));

        let dune = &page.books[0];
        assert_eq!(dune.id, "9780441013593");
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.authors, vec!["Frank Herbert"]);
        assert_eq!(dune.publisher.as_deref(), Some("Ace Books"));
        assert_eq!(dune.year(), Some("1965"));
        assert_eq!(
            dune.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/11481354-M.jpg")
        );
        assert_eq!(
            dune.url,
            Some(format!("{}/works/OL893415W", server.url()))
        );

        // Without an ISBN the work key is the identifier
        assert_eq!(page.books[1].id, "/works/OL893416W");
        assert!(page.books[1].cover_url.is_none());
    }

    #[tokio::test]
    async fn test_short_page_is_last() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
            .with_status(200)
            .with_body(r#"{"numFound": 21, "start": 20, "docs": [{"title": "Dune: The Graphic Novel"}]}"#)
            .create_async()
            .await;

        let source = source_for(&server);
        let page = source
            .search_page(&PageRequest::first("dune").page(3))
            .await
            .unwrap();

        assert!(page.is_last);
        assert_eq!(page.next_page(), None);
        assert_eq!(page.books.len(), 1);
    }

    #[tokio::test]
    async fn test_untitled_docs_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"numFound": 2, "start": 0, "docs": [{"key": "/works/OL1W"}, {"title": "Dune"}]}"#)
            .create_async()
            .await;

        let page = source_for(&server)
            .search_page(&PageRequest::first("dune"))
            .await
            .unwrap();

        assert_eq!(page.books.len(), 1);
        assert_eq!(page.books[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_without_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = source_for(&server)
            .search_page(&PageRequest::first("  "))
            .await;

        assert!(matches!(result, Err(SourceError::InvalidRequest(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let result = source_for(&server)
            .search_page(&PageRequest::first("dune"))
            .await;

        assert!(matches!(result, Err(SourceError::InvalidRequest(_))));
        mock.assert_async().await;
    }
}
