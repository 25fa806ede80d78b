//! Configuration management.
//!
//! Settings come from a TOML file with `BOOK_FINDER_*` environment overrides.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! kakao = "your-rest-api-key"
//!
//! [search]
//! default_source = "openlibrary"
//! page_size = 10
//! max_cached_sessions = 8
//!
//! [http]
//! timeout_seconds = 30
//!
//! [cache]
//! enabled = true
//! directory = "~/.cache/book-finder"
//! ttl_seconds = 1800
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "book-finder.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for book providers
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Search and pagination settings
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Page cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Kakao REST API key (required for the kakao source)
    #[serde(default = "kakao_key_from_env")]
    pub kakao: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            kakao: kakao_key_from_env(),
        }
    }
}

fn kakao_key_from_env() -> Option<String> {
    std::env::var("KAKAO_REST_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Source used when none is given on the command line
    #[serde(default = "default_source")]
    pub default_source: String,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How many past queries keep their pages in memory
    #[serde(default = "default_max_cached_sessions")]
    pub max_cached_sessions: usize,

    /// Open Library API base URL
    #[serde(default = "default_open_library_url")]
    pub open_library_url: String,

    /// Kakao API base URL
    #[serde(default = "default_kakao_url")]
    pub kakao_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_source: default_source(),
            page_size: default_page_size(),
            max_cached_sessions: default_max_cached_sessions(),
            open_library_url: default_open_library_url(),
            kakao_url: default_kakao_url(),
        }
    }
}

fn default_source() -> String {
    "openlibrary".to_string()
}

fn default_page_size() -> usize {
    crate::models::DEFAULT_PAGE_SIZE
}

fn default_max_cached_sessions() -> usize {
    8
}

fn default_open_library_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_kakao_url() -> String {
    "https://dapi.kakao.com".to_string()
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Custom user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory (defaults to the platform cache dir)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// How long a cached page stays fresh
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    1800 // 30 minutes
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" for structured output, anything else for the default formatter
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default cache directory: `<platform cache dir>/book-finder`
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("book-finder")
}

/// Default location for the user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("book-finder").join("config.toml"))
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|p| p.is_file())
}

/// `BOOK_FINDER_<SECTION>__<KEY>` overrides, e.g. `BOOK_FINDER_SEARCH__PAGE_SIZE=25`
fn environment() -> config::Environment {
    config::Environment::with_prefix("BOOK_FINDER")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn build(file: Option<&Path>, env: config::Environment) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path));
    }

    builder.add_source(env).build()?.try_deserialize()
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    build(Some(path), environment())
}

/// Get the configuration without a file: defaults plus environment overrides
pub fn get_config() -> Config {
    match build(None, environment()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring invalid BOOK_FINDER_* environment settings: {}", e);
            Config::default()
        }
    }
}

/// Write a configuration as TOML, creating parent directories as needed
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
