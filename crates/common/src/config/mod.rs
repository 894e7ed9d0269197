//! Configuration management for citetree
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with CITETREE__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values

use crate::graph::Direction;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream maximum for a single citations/references page
pub const MAX_RELATIONS_PER_PAGE: usize = 1000;

/// Upstream maximum for one bulk paper lookup
pub const MAX_BATCH_SIZE: usize = 500;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Graph store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Scholar API client configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Default crawl parameters
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Metadata backfill configuration
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. sqlite://papers.db?mode=rwc
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key for authenticated requests (also read from S2_API_KEY)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_scholar_timeout")]
    pub timeout_secs: u64,

    /// Client-side request pacing (0 to disable)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Maximum traversal depth
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Traversal direction
    #[serde(default)]
    pub direction: Direction,

    /// Maximum citations/references fetched per paper
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Only store influential edges (traversal is always influential-only)
    #[serde(default)]
    pub influential_only: bool,

    /// Treat upstream connection failures on a relations fetch as an empty
    /// result. Only for clients that report "no neighbors" that way; the
    /// bundled HTTP client does not, so this stays off by default.
    #[serde(default = "default_empty_result_shim")]
    pub empty_result_shim: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Papers per bulk request (clamped to the upstream maximum)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "default_batch_cooldown")]
    pub batch_cooldown_ms: u64,

    /// Linear retry base in milliseconds
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,

    /// Attempts per batch
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_database_url() -> String { "sqlite://citetree.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_api_base() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_scholar_timeout() -> u64 { 30 }
fn default_requests_per_second() -> u32 { 0 }
fn default_depth() -> u32 { 2 }
fn default_limit() -> usize { MAX_RELATIONS_PER_PAGE }
fn default_empty_result_shim() -> bool { false }
fn default_batch_size() -> usize { MAX_BATCH_SIZE }
fn default_batch_cooldown() -> u64 { 1000 }
fn default_retry_base() -> u64 { 5000 }
fn default_max_attempts() -> u32 { 3 }
fn default_log_level() -> String { "info".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("CITETREE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with CITETREE__ prefix
            // e.g., CITETREE__FETCHER__BATCH_SIZE=100
            .add_source(
                Environment::with_prefix("CITETREE")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("CITETREE")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// The conventional S2_API_KEY variable fills in a missing key
    fn apply_env_overrides(&mut self) {
        if self.scholar.api_key.is_none() {
            self.scholar.api_key = std::env::var("S2_API_KEY").ok().filter(|k| !k.is_empty());
        }
    }

    /// Point the store at a SQLite file, creating it if needed
    pub fn with_database_path(mut self, path: &std::path::Path) -> Self {
        self.database.url = sqlite_url(path);
        self
    }
}

/// SQLite URL for a file path, created on first open
pub fn sqlite_url(path: &std::path::Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

/// File behind a SQLite URL; `None` for in-memory stores
pub fn sqlite_path(url: &str) -> Option<std::path::PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(std::path::PathBuf::from(path))
    }
}

impl ScholarConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FetcherConfig {
    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_millis(self.batch_cooldown_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    /// Batch size bounded by the upstream bulk limit
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            timeout_secs: default_scholar_timeout(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            direction: Direction::default(),
            limit: default_limit(),
            influential_only: false,
            empty_result_shim: default_empty_result_shim(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_cooldown_ms: default_batch_cooldown(),
            retry_base_ms: default_retry_base(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scholar: ScholarConfig::default(),
            crawler: CrawlerConfig::default(),
            fetcher: FetcherConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
