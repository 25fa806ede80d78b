//! Local caching for result pages.
//!
//! Pages fetched from a provider are written to disk so that repeating a
//! search (or scrolling back over one) does not hit the network again.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.cache/book-finder/
//!   pages/
//!     <hash>.json
//! ```
//!
//! Each cached item is a JSON file containing the page plus metadata.

use crate::config::CacheConfig;
use crate::models::{PageRequest, ResultPage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Cache metadata stored with each cached item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the item was cached (Unix timestamp)
    cached_at: u64,

    /// When the item expires (Unix timestamp)
    expires_at: u64,

    /// Source ID that provided this data
    source: String,

    /// Query that was executed
    query: String,
}

/// Wrapper for a cached page
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPage {
    metadata: CacheMetadata,
    page: ResultPage,
}

/// Result of a cache lookup
#[derive(Debug)]
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Disk cache for result pages
#[derive(Debug, Clone)]
pub struct PageCache {
    base_dir: PathBuf,
    page_dir: PathBuf,
    config: CacheConfig,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl PageCache {
    /// Create a cache with the default config
    pub fn new() -> Self {
        Self::from_config(CacheConfig::default())
    }

    /// Create a cache with the given config
    pub fn from_config(config: CacheConfig) -> Self {
        let base_dir = config
            .directory
            .clone()
            .unwrap_or_else(crate::config::default_cache_dir);
        let page_dir = base_dir.join("pages");

        Self {
            base_dir,
            page_dir,
            config,
        }
    }

    /// Initialize the cache directories
    pub fn initialize(&self) -> std::io::Result<()> {
        if self.config.enabled {
            fs::create_dir_all(&self.page_dir)?;
            tracing::debug!("Page cache initialized at: {}", self.base_dir.display());
        } else {
            tracing::debug!("Page cache is disabled");
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Key for one page of one query at one source
    fn page_key(&self, source: &str, request: &PageRequest) -> String {
        let input = format!(
            "{}|{}|{}|{}",
            source, request.query, request.page, request.page_size
        );
        format!("{:x}.json", md5::compute(input.as_bytes()))
    }

    /// Read a cached page
    pub fn get_page(&self, source: &str, request: &PageRequest) -> CacheResult<ResultPage> {
        if !self.is_enabled() {
            return CacheResult::Miss;
        }

        let key = self.page_key(source, request);
        let cache_path = self.page_dir.join(&key);

        match self.read_cache_file::<CachedPage>(&cache_path) {
            Ok(cached) if now_secs() >= cached.metadata.expires_at => {
                tracing::debug!("Cache expired for page {} of {:?}", request.page, request.query);
                CacheResult::Expired
            }
            Ok(cached) => {
                tracing::debug!("Cache HIT for page {} of {:?}", request.page, request.query);
                CacheResult::Hit(cached.page)
            }
            Err(_) => {
                tracing::debug!("Cache MISS for page {} of {:?}", request.page, request.query);
                CacheResult::Miss
            }
        }
    }

    /// Cache a page
    pub fn set_page(&self, source: &str, request: &PageRequest, page: &ResultPage) {
        if !self.is_enabled() {
            return;
        }

        let key = self.page_key(source, request);
        let cache_path = self.page_dir.join(&key);
        let cached_at = now_secs();

        let cached = CachedPage {
            metadata: CacheMetadata {
                cached_at,
                expires_at: cached_at + self.config.ttl_seconds,
                source: source.to_string(),
                query: request.query.clone(),
            },
            page: page.clone(),
        };

        if let Err(e) = self.write_cache_file(&cache_path, &cached) {
            tracing::warn!("Failed to cache page: {}", e);
        } else {
            tracing::debug!("Cached page {} of {:?}", request.page, request.query);
        }
    }

    fn read_cache_file<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> std::io::Result<T> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    fn write_cache_file<T: Serialize>(&self, path: &Path, data: &T) -> std::io::Result<()> {
        fs::create_dir_all(&self.page_dir)?;
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content)
    }

    /// Clear all cached pages
    pub fn clear_all(&self) -> std::io::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let _ = fs::remove_dir_all(&self.page_dir);
        self.initialize()?;
        tracing::info!("Page cache cleared");
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if !self.is_enabled() {
            return CacheStats::disabled();
        }

        let mut page_count = 0;
        let mut size_bytes = 0;
        if let Ok(entries) = self.page_dir.read_dir() {
            for entry in entries.flatten() {
                page_count += 1;
                size_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        CacheStats {
            enabled: true,
            cache_dir: self.base_dir.clone(),
            page_count,
            size_kb: size_bytes / 1024,
            ttl: Duration::from_secs(self.config.ttl_seconds),
        }
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub enabled: bool,
    pub cache_dir: PathBuf,
    pub page_count: usize,
    pub size_kb: u64,
    pub ttl: Duration,
}

impl CacheStats {
    fn disabled() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::new(),
            page_count: 0,
            size_kb: 0,
            ttl: Duration::ZERO,
        }
    }
}
