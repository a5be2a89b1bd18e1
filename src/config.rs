//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::amazon::markets::Market;
use crate::amazon::parser::SyntheticIds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Amazon marketplace
    #[serde(default)]
    pub market: Market,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay before every request in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Requests served by one session before it is replaced
    #[serde(default = "default_max_requests_per_session")]
    pub max_requests_per_session: u32,

    /// Consecutive 503 responses that force a session rotation
    #[serde(default = "default_rotate_after_503")]
    pub rotate_after_503: u32,

    /// Pause before a rotated session is used
    #[serde(default = "default_rotation_pause_ms")]
    pub rotation_pause_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff multiplier applied to HTTP 429
    #[serde(default = "default_rate_limit_factor")]
    pub rate_limit_factor: u32,

    /// Timeout of the first attempt; attempt N gets N times this
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Entries per result cache (0 disables caching)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Categories processed at the same time
    #[serde(default = "default_category_workers")]
    pub category_workers: usize,

    /// Network calls in flight across all categories
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Search result pages read per query
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_max_queries_per_category")]
    pub max_queries_per_category: usize,

    /// Products saved per category when the category names no quota
    #[serde(default = "default_products_per_category")]
    pub products_per_category: usize,

    #[serde(default = "default_products_dir")]
    pub products_dir: PathBuf,

    /// Directory holding progress checkpoints
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Handling of result cards without an ASIN
    #[serde(default)]
    pub synthetic_ids: SyntheticIds,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_delay_jitter_ms() -> u64 {
    3000
}

fn default_max_requests_per_session() -> u32 {
    40
}

fn default_rotate_after_503() -> u32 {
    3
}

fn default_rotation_pause_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_rate_limit_factor() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_cache_capacity() -> usize {
    500
}

fn default_category_workers() -> usize {
    3
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_max_pages() -> u32 {
    3
}

fn default_max_queries_per_category() -> usize {
    3
}

fn default_products_per_category() -> usize {
    10
}

fn default_products_dir() -> PathBuf {
    PathBuf::from("products")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".amz-harvest")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market: Market::Us,
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            max_requests_per_session: default_max_requests_per_session(),
            rotate_after_503: default_rotate_after_503(),
            rotation_pause_ms: default_rotation_pause_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            rate_limit_factor: default_rate_limit_factor(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            category_workers: default_category_workers(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_pages: default_max_pages(),
            max_queries_per_category: default_max_queries_per_category(),
            products_per_category: default_products_per_category(),
            products_dir: default_products_dir(),
            state_dir: default_state_dir(),
            synthetic_ids: SyntheticIds::default(),
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("amz-harvest").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides. Unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(market) = std::env::var("AMZ_MARKET") {
            if let Ok(m) = market.parse() {
                self.market = m;
            }
        }

        if let Ok(proxy) = std::env::var("AMZ_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("AMZ_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(dir) = std::env::var("AMZ_PRODUCTS_DIR") {
            if !dir.is_empty() {
                self.products_dir = PathBuf::from(dir);
            }
        }

        self
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: table, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
