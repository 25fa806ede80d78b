//! Registry for managing book sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BookSource, KakaoSource, OpenLibrarySource, SourceError};
use crate::config::Config;
use crate::utils::HttpClient;

/// Registry of the available book sources, keyed by id
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn BookSource>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in source configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = Arc::new(HttpClient::from_config(&config.http)?);
        let mut registry = Self::new();

        registry.register(Arc::new(OpenLibrarySource::with_base_url(
            Arc::clone(&client),
            &config.search.open_library_url,
        )));
        registry.register(Arc::new(KakaoSource::with_base_url(
            client,
            config.api_keys.kakao.clone(),
            &config.search.kakao_url,
        )));

        Ok(registry)
    }

    /// Register a source, replacing any source with the same id
    pub fn register(&mut self, source: Arc<dyn BookSource>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn BookSource>> {
        self.sources.get(id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<Arc<dyn BookSource>, SourceError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", id)))
    }

    /// All registered sources, ordered by id
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn BookSource>> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
