//! Polling until a remote resource settles.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::{SdkError, SdkResult};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long and how patiently to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits until the resource settles.
    pub timeout: Option<Duration>,
    /// Transient failures tolerated in a row before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            max_consecutive_errors: 3,
        }
    }
}

impl WaitOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_consecutive_errors(mut self, n: u32) -> Self {
        self.max_consecutive_errors = n;
        self
    }
}

/// Fetch repeatedly until `is_done` accepts the result.
///
/// Transient errors are retried on the next tick; a successful fetch resets
/// the count. Non-transient errors end the wait immediately. When
/// `options.timeout` elapses first, fails with [`SdkError::Timeout`].
pub async fn poll_until<T, F, Fut, D>(
    options: &WaitOptions,
    resource: &'static str,
    id: &str,
    mut fetch: F,
    mut is_done: D,
) -> SdkResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SdkResult<T>>,
    D: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let error_budget = options.max_consecutive_errors.max(1);
    let mut consecutive_errors = 0;

    loop {
        match fetch().await {
            Ok(value) => {
                consecutive_errors = 0;
                if is_done(&value) {
                    return Ok(value);
                }
                debug!(resource, id, "still pending");
            }
            Err(e) if e.is_transient() => {
                consecutive_errors += 1;
                if consecutive_errors >= error_budget {
                    return Err(e);
                }
                warn!(resource, id, error = %e, consecutive_errors, "transient error while polling");
            }
            Err(e) => return Err(e),
        }

        let mut delay = options.poll_interval;
        if let Some(timeout) = options.timeout {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(SdkError::Timeout {
                    resource,
                    id: id.to_string(),
                });
            }
            delay = delay.min(timeout - elapsed);
        }
        sleep(delay).await;
    }
}
