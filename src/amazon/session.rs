//! Browser-like HTTP sessions with rotation.
//!
//! A session is a wreq client plus the fingerprint it presents: user agent,
//! platform hint, language and cookies. Sessions are replaced after a fixed
//! number of requests or after repeated 503s, and every replacement bumps a
//! generation number so concurrent callers reacting to the same failure
//! rotate only once.

use crate::amazon::markets::Market;
use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wreq::Client;

/// User agent and the matching client-hint platform.
#[derive(Debug)]
pub struct Fingerprint {
    pub user_agent: &'static str,
    pub platform: &'static str,
}

/// Chrome 131 on the desktop platforms, matching the TLS emulation profile.
const FINGERPRINTS: &[Fingerprint] = &[
    Fingerprint {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "\"Windows\"",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "\"macOS\"",
    },
    Fingerprint {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "\"Linux\"",
    },
];

/// One live identity towards the marketplace.
pub struct ScrapeSession {
    client: Client,
    fingerprint: &'static Fingerprint,
    cookie: String,
    requests: u32,
    consecutive_errors: u32,
    consecutive_503: u32,
    created_at: Instant,
    generation: u64,
}

impl ScrapeSession {
    fn headers(&self, market: Market) -> Vec<(&'static str, String)> {
        vec![
            ("User-Agent", self.fingerprint.user_agent.to_string()),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"
                    .to_string(),
            ),
            ("Accept-Language", market.accept_language().to_string()),
            ("Cache-Control", "no-cache".to_string()),
            ("Pragma", "no-cache".to_string()),
            ("Sec-Ch-Ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"".to_string()),
            ("Sec-Ch-Ua-Mobile", "?0".to_string()),
            ("Sec-Ch-Ua-Platform", self.fingerprint.platform.to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "none".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Cookie", self.cookie.clone()),
        ]
    }
}

/// Builds a fresh client and fingerprint for `market`.
pub fn create_session(market: Market, proxy: Option<&str>, generation: u64) -> Result<ScrapeSession> {
    // No cookie jar: the session's own header is the only cookie sent.
    let mut builder = Client::builder()
        .gzip(true)
        .brotli(true)
        .connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = proxy {
        debug!("Configuring proxy: {}", proxy_url);
        let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
        builder = builder.proxy(proxy);
    }

    let client = builder.build().context("Failed to build HTTP client")?;
    let fingerprint = &FINGERPRINTS[rand::random_range(0..FINGERPRINTS.len())];

    Ok(ScrapeSession {
        client,
        fingerprint,
        cookie: session_cookie(market),
        requests: 0,
        consecutive_errors: 0,
        consecutive_503: 0,
        created_at: Instant::now(),
        generation,
    })
}

/// Cookies a returning visitor of `market` would carry.
fn session_cookie(market: Market) -> String {
    let session_id = format!(
        "{:03}-{:07}-{:07}",
        rand::random_range(100..1000u32),
        rand::random_range(0..10_000_000u32),
        rand::random_range(0..10_000_000u32),
    );
    format!(
        "session-id={}; i18n-prefs={}; lc-main={}",
        session_id,
        market.currency(),
        market.profile().locale
    )
}

/// What a caller needs to send one request.
pub struct Lease {
    pub client: Client,
    pub headers: Vec<(&'static str, String)>,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_requests: u32,
    pub rotate_after_503: u32,
    pub rotation_pause: Duration,
}

impl SessionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_requests: config.max_requests_per_session.max(1),
            rotate_after_503: config.rotate_after_503.max(1),
            rotation_pause: Duration::from_millis(config.rotation_pause_ms),
        }
    }
}

/// Owns the active session and decides when to replace it.
pub struct SessionManager {
    market: Market,
    proxy: Option<String>,
    limits: SessionLimits,
    current: Mutex<ScrapeSession>,
    rotations: AtomicU64,
}

impl SessionManager {
    /// Creates the first session. Failure here is a startup error.
    pub fn new(market: Market, proxy: Option<String>, limits: SessionLimits) -> Result<Self> {
        let session = create_session(market, proxy.as_deref(), 0)?;
        Ok(Self {
            market,
            proxy,
            limits,
            current: Mutex::new(session),
            rotations: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScrapeSession> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hands out the active session, rotating first once it is used up.
    pub async fn lease(&self) -> Lease {
        loop {
            let exhausted = {
                let mut session = self.lock();
                if session.requests < self.limits.max_requests {
                    session.requests += 1;
                    return Lease {
                        client: session.client.clone(),
                        headers: session.headers(self.market),
                        generation: session.generation,
                    };
                }
                session.generation
            };
            debug!("Session served {} requests, rotating", self.limits.max_requests);
            self.rotate(exhausted).await;
        }
    }

    /// Replaces the session if it is still at `generation`.
    ///
    /// Returns whether this call performed the rotation.
    pub async fn rotate(&self, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        if !self.limits.rotation_pause.is_zero() {
            tokio::time::sleep(self.limits.rotation_pause).await;
        }

        let mut session = self.lock();
        if session.generation != generation {
            return false;
        }

        let next = generation + 1;
        let age = session.created_at.elapsed();
        match create_session(self.market, self.proxy.as_deref(), next) {
            Ok(fresh) => *session = fresh,
            Err(e) => {
                // Keep the old client but present a new identity.
                warn!("Session rebuild failed, reusing client: {:#}", e);
                session.cookie = session_cookie(self.market);
                session.requests = 0;
                session.consecutive_errors = 0;
                session.consecutive_503 = 0;
                session.created_at = Instant::now();
                session.generation = next;
            }
        }
        self.rotations.fetch_add(1, Ordering::Relaxed);
        info!("Rotated session (generation {}, previous lived {:.1}s)", next, age.as_secs_f32());
        true
    }

    pub fn record_success(&self, generation: u64) {
        let mut session = self.lock();
        if session.generation == generation {
            session.consecutive_errors = 0;
            session.consecutive_503 = 0;
        }
    }

    /// Counts a failed attempt; `status` is `None` for network errors and
    /// block pages. Rotates after too many consecutive 503s.
    pub async fn record_failure(&self, generation: u64, status: Option<u16>) {
        let should_rotate = {
            let mut session = self.lock();
            if session.generation != generation {
                return;
            }
            session.consecutive_errors += 1;
            if status == Some(503) {
                session.consecutive_503 += 1;
            } else {
                session.consecutive_503 = 0;
            }
            session.consecutive_503 >= self.limits.rotate_after_503
        };

        if should_rotate {
            warn!("{} consecutive 503 responses, rotating session", self.limits.rotate_after_503);
            self.rotate(generation).await;
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Requests served by the active session.
    pub fn requests(&self) -> u32 {
        self.lock().requests
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.lock().consecutive_errors
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub fn market(&self) -> Market {
        self.market
    }
}
