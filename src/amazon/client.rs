//! HTTP client for Amazon requests using wreq for TLS fingerprint emulation.
//!
//! Every request goes through [`AmazonClient::fetch`], which paces, retries
//! and rotates sessions as needed. Scraping friction never surfaces as an
//! error: a page that cannot be obtained is simply `None`.

use crate::amazon::markets::Market;
use crate::amazon::parser::detect_block;
use crate::amazon::retry::{Outcome, RetryPolicy};
use crate::amazon::session::{Lease, SessionLimits, SessionManager};
use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq_util::Emulation;

/// Trait for Amazon search/product fetching - enables mocking for tests.
#[async_trait]
pub trait AmazonSearch: Send + Sync {
    /// Fetches one search results page.
    async fn search(&self, query: &str, page: u32) -> Option<String>;

    /// Fetches a product page by ASIN.
    async fn product(&self, asin: &str) -> Option<String>;

    /// Returns the configured marketplace.
    fn market(&self) -> Market;
}

/// Request counters, reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub requests: u64,
    pub retries: u64,
    pub rotations: u64,
    pub blocks: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    retries: AtomicU64,
    blocks: AtomicU64,
    failures: AtomicU64,
}

enum Attempt {
    Body(String),
    Failed { outcome: Outcome, status: Option<u16> },
}

/// Amazon HTTP client with browser impersonation and anti-bot measures.
pub struct AmazonClient {
    sessions: SessionManager,
    policy: RetryPolicy,
    market: Market,
    delay_ms: u64,
    delay_jitter_ms: u64,
    base_url: Option<String>,
    counters: Counters,
}

impl AmazonClient {
    /// Creates a new Amazon client with the given configuration.
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(config, None).await
    }

    /// Creates a new Amazon client with an optional custom base URL (for testing).
    pub async fn with_base_url(config: &Config, base_url: Option<String>) -> Result<Self> {
        let sessions = SessionManager::new(
            config.market,
            config.proxy.clone(),
            SessionLimits::from_config(config),
        )?;

        Ok(Self {
            sessions,
            policy: RetryPolicy::from_config(config),
            market: config.market,
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
            base_url,
            counters: Counters::default(),
        })
    }

    /// Returns the base URL (custom for testing, or market-based for production).
    fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| self.market.base_url())
    }

    /// GETs `url`, retrying transient failures with backoff.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        let mut attempt = 1;
        loop {
            let lease = self.sessions.lease().await;
            self.delay().await;
            self.counters.requests.fetch_add(1, Ordering::Relaxed);

            match self.attempt(&lease, url, attempt).await {
                Attempt::Body(body) => {
                    self.sessions.record_success(lease.generation);
                    return Some(body);
                }
                Attempt::Failed { outcome, status } => {
                    if outcome.is_retryable() {
                        self.sessions.record_failure(lease.generation, status).await;
                    }
                    if !self.policy.should_retry(attempt, outcome) {
                        self.counters.failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Giving up on {} after {} attempt(s) ({:?})", url, attempt, outcome);
                        return None;
                    }

                    let wait = self.policy.backoff(attempt, outcome);
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    debug!("Retrying {} in {}ms ({:?}, attempt {})", url, wait.as_millis(), outcome, attempt);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, lease: &Lease, url: &str, attempt: u32) -> Attempt {
        debug!("GET {} (attempt {}, session {})", url, attempt, lease.generation);

        let mut request = lease.client.get(url).emulation(Emulation::Chrome131);
        for (name, value) in &lease.headers {
            request = request.header(*name, value.as_str());
        }

        let exchange = async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let final_url = response.uri().to_string();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, final_url, body))
        };

        let timeout = self.policy.timeout_for(attempt);
        let (status, final_url, body) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                debug!("Request error: {}", e);
                return Attempt::Failed { outcome: Outcome::ServerError, status: None };
            }
            Err(_) => {
                debug!("Request timed out after {}s", timeout.as_secs());
                return Attempt::Failed { outcome: Outcome::ServerError, status: None };
            }
        };

        debug!("Response status: {}", status);
        let outcome = self.policy.classify(status);
        if outcome != Outcome::Success {
            if status == 503 {
                warn!("Rate limited (503) on {}", url);
            }
            return Attempt::Failed { outcome, status: Some(status) };
        }

        if let Some(marker) = detect_block(&body) {
            self.counters.blocks.fetch_add(1, Ordering::Relaxed);
            warn!("Block page detected ({:?}) on {}", marker, url);
            return Attempt::Failed { outcome: Outcome::ServerError, status: None };
        }

        if self.base_url.is_none() && !final_url.contains(self.market.domain()) {
            warn!(
                "Redirected to different domain: {}. Your IP may be associated with a different market.",
                final_url
            );
        }

        Attempt::Body(body)
    }

    /// Adds a random delay to mimic human behavior.
    async fn delay(&self) {
        if self.delay_ms == 0 && self.delay_jitter_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            rotations: self.sessions.rotations(),
            blocks: self.counters.blocks.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

#[async_trait]
impl AmazonSearch for AmazonClient {
    async fn search(&self, query: &str, page: u32) -> Option<String> {
        let url = format!("{}/s?k={}&page={}", self.base_url(), urlencoding::encode(query), page);

        info!("Searching: {} (page {})", query, page);
        self.fetch(&url).await
    }

    async fn product(&self, asin: &str) -> Option<String> {
        let url = format!("{}/dp/{}", self.base_url(), asin);

        debug!("Fetching product: {}", asin);
        self.fetch(&url).await
    }

    fn market(&self) -> Market {
        self.market
    }
}
