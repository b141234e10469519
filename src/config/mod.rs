//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the API listener
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Search pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Records requested from each source per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-source call timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            source_timeout_secs: default_source_timeout(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache store location; shared storage makes entries visible to all
    /// instances
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_cache_path(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Which counter store backs the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterBackend {
    /// In-process map; approximate under horizontal scaling
    Memory,
    /// sled tree; exact, shareable across instances
    Sled,
}

/// Rate limiter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per identity per window
    #[serde(default = "default_rate_limit")]
    pub limit: u32,

    #[serde(default = "default_rate_window")]
    pub window_secs: u64,

    #[serde(default = "default_limiter_backend")]
    pub backend: LimiterBackend,

    /// Store location for the sled backend
    #[serde(default = "default_limiter_path")]
    pub path: PathBuf,

    /// How often the memory backend reaps expired windows
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_rate_limit(),
            window_secs: default_rate_window(),
            backend: default_limiter_backend(),
            path: default_limiter_path(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Per-source credentials and courtesy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_api_key: Option<String>,

    /// Contact email for the OpenAlex polite pool
    #[serde(default)]
    pub openalex_mailto: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            semantic_api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
            openalex_mailto: std::env::var("OPENALEX_EMAIL").ok(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_source_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/search-cache")
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_rate_limit() -> u32 {
    30
}

fn default_rate_window() -> u64 {
    60
}

fn default_limiter_backend() -> LimiterBackend {
    LimiterBackend::Memory
}

fn default_limiter_path() -> PathBuf {
    PathBuf::from("./data/rate-limits")
}

fn default_sweep_interval() -> u64 {
    60
}

/// Load configuration from an optional file plus environment overrides
/// (prefix `PAPER_SEARCH`, e.g. `PAPER_SEARCH_SERVER__BIND`).
pub fn load_config(path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix("PAPER_SEARCH").separator("__"))
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.page_size, 20);
        assert_eq!(config.search.source_timeout_secs, 10);
        assert_eq!(config.rate_limit.limit, 30);
        assert_eq!(config.rate_limit.backend, LimiterBackend::Memory);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }
}
