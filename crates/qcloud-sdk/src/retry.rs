//! Retry policy for HTTP calls.
//!
//! Retries are decided per attempt: a response whose status is in
//! `retry_statuses`, or (for `GET` only) a connection failure or timeout,
//! is retried after `base_delay * 2^attempt` until `max_retries` is reached.
//! The 401 token-refresh retry lives in the requester and is independent of
//! this policy.

use std::time::Duration;

use reqwest::Method;
use rustc_hash::FxHashSet;

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 6] = [408, 425, 429, 500, 502, 504];

/// Backoff configuration for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_statuses: FxHashSet<u16>,
    pub base_delay: Duration,
    /// Retry connection errors and timeouts for idempotent `GET` requests.
    pub retry_connection_errors_for_get: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_statuses: DEFAULT_RETRY_STATUSES.into_iter().collect(),
            base_delay: Duration::from_secs(1),
            retry_connection_errors_for_get: true,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            retry_statuses: FxHashSet::default(),
            base_delay: Duration::ZERO,
            retry_connection_errors_for_get: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_statuses = statuses.into_iter().collect();
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether a response with `status` should be retried after `attempt`
    /// failed attempts.
    pub fn should_retry_status(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_retries && self.retry_statuses.contains(&status)
    }

    /// Whether a transport error should be retried.
    pub fn should_retry_error(&self, method: &Method, error: &reqwest::Error, attempt: u32) -> bool {
        attempt < self.max_retries
            && self.retry_connection_errors_for_get
            && *method == Method::GET
            && (error.is_connect() || error.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(31));
    }

    #[test]
    fn test_status_retry_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry_status(502, 0));
        assert!(policy.should_retry_status(429, 4));
        assert!(!policy.should_retry_status(502, 5));
        assert!(!policy.should_retry_status(400, 0));
        assert!(!policy.should_retry_status(401, 0));
    }

    #[test]
    fn test_none_policy() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry_status(502, 0));
        assert_eq!(policy.delay_for(3), Duration::ZERO);
    }
}
