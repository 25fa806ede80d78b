//! Kakao book search source.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{BookBuilder, BookRecord, PageRequest, Provider, ResultPage};
use crate::sources::{status_error, BookSource, SourceError};
use crate::utils::{interactive_retry_config, with_retry, HttpClient};

const KAKAO_API_BASE: &str = "https://dapi.kakao.com";

/// The API refuses page numbers and sizes above this
const KAKAO_MAX_PAGE: u32 = 50;
const KAKAO_MAX_SIZE: usize = 50;

/// Kakao book search source
///
/// Requires a REST API key, sent as `Authorization: KakaoAK <key>`.
#[derive(Debug, Clone)]
pub struct KakaoSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl KakaoSource {
    pub fn new(client: Arc<HttpClient>, api_key: Option<String>) -> Self {
        Self::with_base_url(client, api_key, KAKAO_API_BASE)
    }

    pub fn with_base_url(
        client: Arc<HttpClient>,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn search_url(&self, request: &PageRequest) -> String {
        format!(
            "{}/v3/search/book?query={}&page={}&size={}",
            self.base_url,
            urlencoding::encode(request.query.trim()),
            request.page,
            request.page_size.min(KAKAO_MAX_SIZE)
        )
    }
}

/// Kakao sends "ISBN10 ISBN13"; either half may be blank
fn preferred_isbn(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .max_by_key(|isbn| isbn.len())
        .map(str::to_string)
}

/// Reduce "2014-11-17T00:00:00.000+09:00" to "2014-11-17"
fn publication_date(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.date_naive().to_string()),
        Err(_) => Some(raw.to_string()),
    }
}

fn to_record(doc: KakaoDocument) -> Option<BookRecord> {
    if doc.title.trim().is_empty() {
        return None;
    }

    let id = preferred_isbn(&doc.isbn)
        .or_else(|| (!doc.url.is_empty()).then(|| doc.url.clone()))
        .unwrap_or_else(|| doc.title.clone());

    let mut builder = BookBuilder::new(id, doc.title, Provider::Kakao).authors(doc.authors);

    if !doc.thumbnail.is_empty() {
        builder = builder.cover_url(doc.thumbnail);
    }
    if !doc.publisher.is_empty() {
        builder = builder.publisher(doc.publisher);
    }
    if let Some(date) = publication_date(&doc.datetime) {
        builder = builder.published(date);
    }
    if !doc.contents.is_empty() {
        builder = builder.description(doc.contents);
    }
    if !doc.url.is_empty() {
        builder = builder.url(doc.url);
    }

    Some(builder.build())
}

#[async_trait]
impl BookSource for KakaoSource {
    fn id(&self) -> &str {
        "kakao"
    }

    fn name(&self) -> &str {
        "Kakao Book"
    }

    async fn search_page(&self, request: &PageRequest) -> Result<ResultPage, SourceError> {
        self.validate_query(&request.query)?;

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::Auth("KAKAO_REST_API_KEY is not set".to_string()))?;

        if request.page > KAKAO_MAX_PAGE {
            return Ok(ResultPage::new(request.page, Vec::new()));
        }

        let url = self.search_url(request);
        let authorization = format!("KakaoAK {}", api_key);
        let client = Arc::clone(&self.client);

        let response = with_retry(interactive_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let authorization = authorization.clone();
            async move {
                let response = client
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, authorization)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to search Kakao: {}", e)))?;

                if !response.status().is_success() {
                    return Err(status_error("Kakao", response.status()));
                }

                Ok(response)
            }
        })
        .await?;

        let data: KakaoResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let is_last = data.meta.is_end || request.page >= KAKAO_MAX_PAGE;
        let books = data.documents.into_iter().filter_map(to_record).collect();

        Ok(ResultPage::new(request.page, books)
            .is_last(is_last)
            .total(data.meta.total_count))
    }
}

// ===== Kakao API Types =====

#[derive(Debug, Deserialize)]
struct KakaoResponse {
    meta: KakaoMeta,
    #[serde(default)]
    documents: Vec<KakaoDocument>,
}

#[derive(Debug, Deserialize)]
struct KakaoMeta {
    is_end: bool,
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct KakaoDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    contents: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    isbn: String,
    #[serde(default)]
    datetime: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    thumbnail: String,
}
