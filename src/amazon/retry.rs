//! Retry and backoff policy for marketplace requests.

use crate::config::Config;
use std::time::Duration;

/// How a response (or the lack of one) should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// HTTP 429: back off harder before retrying.
    RateLimited,
    /// Transient server trouble, timeouts, network errors and block pages.
    ServerError,
    /// Anything else; retrying will not help.
    Fatal,
}

impl Outcome {
    pub fn is_retryable(self) -> bool {
        matches!(self, Outcome::RateLimited | Outcome::ServerError)
    }
}

/// Pure retry policy: no I/O, no clock, only numbers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub rate_limit_factor: u32,
    pub base_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base: Duration::from_millis(1000),
            rate_limit_factor: 3,
            base_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            rate_limit_factor: config.rate_limit_factor.max(1),
            base_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        }
    }

    pub fn classify(&self, status: u16) -> Outcome {
        match status {
            200..=299 => Outcome::Success,
            429 => Outcome::RateLimited,
            500 | 502 | 503 | 504 => Outcome::ServerError,
            _ => Outcome::Fatal,
        }
    }

    /// Whether another attempt may follow `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, outcome: Outcome) -> bool {
        outcome.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// `base * 2^(attempt-1) * factor` plus jitter below half the unscaled
    /// step, so successive delays strictly increase for a non-zero base.
    pub fn backoff(&self, attempt: u32, outcome: Outcome) -> Duration {
        let step = self.step_ms(attempt);
        let factor = match outcome {
            Outcome::RateLimited => u64::from(self.rate_limit_factor),
            _ => 1,
        };
        let half = step / 2;
        let jitter = if half > 0 { rand::random_range(0..half) } else { 0 };
        Duration::from_millis(step.saturating_mul(factor).saturating_add(jitter))
    }

    /// Per-attempt request timeout; later attempts are given longer.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout.saturating_mul(attempt.max(1))
    }

    fn step_ms(&self, attempt: u32) -> u64 {
        let base = self.backoff_base.as_millis() as u64;
        let exponent = attempt.saturating_sub(1).min(20);
        base.saturating_mul(1u64 << exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_millis(100),
            rate_limit_factor: 3,
            base_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_classify() {
        let p = policy();
        assert_eq!(p.classify(200), Outcome::Success);
        assert_eq!(p.classify(204), Outcome::Success);
        assert_eq!(p.classify(429), Outcome::RateLimited);
        for code in [500, 502, 503, 504] {
            assert_eq!(p.classify(code), Outcome::ServerError);
        }
        assert_eq!(p.classify(404), Outcome::Fatal);
        assert_eq!(p.classify(403), Outcome::Fatal);
        assert_eq!(p.classify(501), Outcome::Fatal);
    }

    #[test]
    fn test_backoff_strictly_increasing() {
        let p = policy();
        for outcome in [Outcome::ServerError, Outcome::RateLimited] {
            // Repeat to cover the jitter range.
            for _ in 0..50 {
                let delays: Vec<_> = (1..=p.max_attempts).map(|a| p.backoff(a, outcome)).collect();
                for pair in delays.windows(2) {
                    assert!(pair[1] > pair[0], "{:?} not increasing for {:?}", delays, outcome);
                }
            }
        }
    }

    #[test]
    fn test_backoff_bounds() {
        let p = policy();
        for _ in 0..50 {
            let first = p.backoff(1, Outcome::ServerError).as_millis();
            assert!((100..150).contains(&first));
            let third = p.backoff(3, Outcome::ServerError).as_millis();
            assert!((400..600).contains(&third));
            let limited = p.backoff(1, Outcome::RateLimited).as_millis();
            assert!((300..350).contains(&limited));
        }
    }

    #[test]
    fn test_zero_base_backoff() {
        let p = RetryPolicy { backoff_base: Duration::ZERO, ..policy() };
        assert_eq!(p.backoff(3, Outcome::ServerError), Duration::ZERO);
    }

    #[test]
    fn test_timeout_scales_with_attempt() {
        let p = policy();
        assert_eq!(p.timeout_for(1), Duration::from_secs(10));
        assert_eq!(p.timeout_for(3), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry_respects_ceiling() {
        let p = policy();
        assert!(p.should_retry(1, Outcome::ServerError));
        assert!(p.should_retry(4, Outcome::RateLimited));
        assert!(!p.should_retry(5, Outcome::ServerError));
        assert!(!p.should_retry(1, Outcome::Fatal));
        assert!(!p.should_retry(1, Outcome::Success));
    }
}
