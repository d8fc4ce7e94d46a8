//! The expiring token provider.
//!
//! [`ExpiringTokenProvider`] owns at most one cached [`Credential`] and hands
//! out its token while it is fresh. Once the credential comes within the
//! safety window of its expiry, the next caller re-acquires through the
//! configured [`TokenSource`]. The slot lock is held across acquisition, so
//! concurrent callers that find a stale credential queue behind the first one
//! and reuse whatever it fetched.
//!
//! | State   | Meaning                                   | `get_token()`        |
//! |---------|-------------------------------------------|----------------------|
//! | `Empty` | nothing acquired yet, or invalidated      | acquire, then cache  |
//! | `Valid` | cached and outside the safety window      | return cached token  |
//! | `Stale` | cached but inside the window (or expired) | acquire, then cache  |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::source::TokenSource;

/// Default margin before expiry at which a credential counts as stale.
pub const DEFAULT_SAFETY_WINDOW: Duration = Duration::from_secs(60);

/// What consumers of bearer tokens depend on.
///
/// The HTTP layer only needs these two calls; it never sees the cache.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer token valid for at least the safety window.
    async fn get_token(&self) -> AuthResult<String>;

    /// Replace a token the server rejected, returning its successor.
    ///
    /// If the rejected token was already replaced by another caller, the
    /// replacement is returned without acquiring again.
    async fn refresh_rejected(&self, rejected: &str) -> AuthResult<String>;

    /// Non-blocking check for a fresh cached token.
    fn has_valid_token(&self) -> bool;
}

/// Observable state of the cached slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Valid,
    Stale,
}

/// Tuning knobs for [`ExpiringTokenProvider`].
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// A credential expiring within this margin is refreshed.
    pub safety_window: Duration,

    /// Upper bound on a single acquisition; `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            safety_window: DEFAULT_SAFETY_WINDOW,
            acquire_timeout: None,
        }
    }
}

impl ProviderOptions {
    pub fn with_safety_window(mut self, window: Duration) -> Self {
        self.safety_window = window;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Caches a credential and re-acquires it lazily when it goes stale.
pub struct ExpiringTokenProvider {
    source: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    options: ProviderOptions,
    window: chrono::Duration,
    slot: Mutex<Option<Credential>>,
}

impl std::fmt::Debug for ExpiringTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringTokenProvider")
            .field("source", &self.source.kind())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ExpiringTokenProvider {
    /// Create a provider over `source` with default options and the system
    /// clock.
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_options(source, ProviderOptions::default())
    }

    /// Create a provider with explicit options.
    pub fn with_options(source: Arc<dyn TokenSource>, options: ProviderOptions) -> Self {
        let window = chrono::Duration::from_std(options.safety_window)
            .unwrap_or(chrono::Duration::MAX);
        Self {
            source,
            clock: Arc::new(SystemClock),
            options,
            window,
            slot: Mutex::new(None),
        }
    }

    /// Replace the clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Return a token valid for at least the safety window, acquiring one if
    /// the cache is empty or stale.
    pub async fn get_token(&self) -> AuthResult<String> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(self.clock.now(), self.window) {
                debug!(expires_at = ?cached.expires_at(), "using cached token");
                return Ok(cached.token().to_owned());
            }
            debug!(expires_at = ?cached.expires_at(), "cached token is stale, refreshing");
        }

        let credential = self.acquire(slot.is_some()).await?;
        let token = credential.token().to_owned();
        *slot = Some(credential);
        Ok(token)
    }

    /// Re-acquire after the server rejected `rejected`.
    pub async fn refresh_rejected(&self, rejected: &str) -> AuthResult<String> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.token() != rejected && cached.is_fresh(self.clock.now(), self.window) {
                debug!("rejected token already replaced");
                return Ok(cached.token().to_owned());
            }
        }

        warn!(source = self.source.kind(), "bearer token rejected by server, re-acquiring");
        *slot = None;

        let credential = self.acquire(true).await?;
        let token = credential.token().to_owned();
        *slot = Some(credential);
        Ok(token)
    }

    /// Drop the cached credential.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    /// Current state of the cached slot.
    pub async fn state(&self) -> CacheState {
        let slot = self.slot.lock().await;
        self.classify(slot.as_ref())
    }

    /// Whether a fresh token is cached. Returns `false` while an
    /// acquisition holds the slot.
    pub fn has_valid_token(&self) -> bool {
        match self.slot.try_lock() {
            Ok(slot) => self.classify(slot.as_ref()) == CacheState::Valid,
            Err(_) => false,
        }
    }

    fn classify(&self, credential: Option<&Credential>) -> CacheState {
        match credential {
            None => CacheState::Empty,
            Some(c) if c.is_fresh(self.clock.now(), self.window) => CacheState::Valid,
            Some(_) => CacheState::Stale,
        }
    }

    /// Run the source once. Never touches the slot.
    async fn acquire(&self, replacing: bool) -> AuthResult<Credential> {
        info!(source = self.source.kind(), replacing, "acquiring access token");

        let attempt = self.source.acquire();
        let credential = match self.options.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| AuthError::Timeout(limit))?,
            None => attempt.await,
        }
        .inspect_err(|e| warn!(source = self.source.kind(), error = %e, "token acquisition failed"))?;

        if !credential.is_fresh(self.clock.now(), self.window) {
            warn!(
                expires_at = ?credential.expires_at(),
                "acquired token expires within the safety window"
            );
            return Err(AuthError::Authentication(format!(
                "{} source returned a token expiring within {:?}",
                self.source.kind(),
                self.options.safety_window
            )));
        }

        debug!(expires_at = ?credential.expires_at(), "access token cached");
        Ok(credential)
    }
}

#[async_trait]
impl TokenProvider for ExpiringTokenProvider {
    async fn get_token(&self) -> AuthResult<String> {
        ExpiringTokenProvider::get_token(self).await
    }

    async fn refresh_rejected(&self, rejected: &str) -> AuthResult<String> {
        ExpiringTokenProvider::refresh_rejected(self, rejected).await
    }

    fn has_valid_token(&self) -> bool {
        ExpiringTokenProvider::has_valid_token(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::StaticTokenSource;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out scripted results and counts calls.
    struct ScriptedSource {
        clock: Arc<ManualClock>,
        script: std::sync::Mutex<VecDeque<AuthResult<(String, i64)>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn new(clock: Arc<ManualClock>, script: Vec<AuthResult<(&str, i64)>>) -> Self {
            Self {
                clock,
                script: std::sync::Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(|(t, s)| (t.to_string(), s)))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for ScriptedSource {
        async fn acquire(&self) -> AuthResult<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok((token, secs))) => Ok(Credential::expiring_in(
                    token,
                    self.clock.now(),
                    chrono::Duration::seconds(secs),
                )),
                Some(Err(e)) => Err(e),
                None => Ok(Credential::expiring_in(
                    format!("extra-{n}"),
                    self.clock.now(),
                    chrono::Duration::seconds(3600),
                )),
            }
        }
    }

    fn provider(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> ExpiringTokenProvider {
        ExpiringTokenProvider::new(source).with_clock(clock)
    }

    #[tokio::test]
    async fn test_static_token_needs_no_acquisition_logic() {
        let provider = ExpiringTokenProvider::new(Arc::new(StaticTokenSource::new("abc")));
        assert_eq!(provider.state().await, CacheState::Empty);
        assert_eq!(provider.get_token().await.unwrap(), "abc");
        assert_eq!(provider.get_token().await.unwrap(), "abc");
        assert_eq!(provider.state().await, CacheState::Valid);
    }

    #[tokio::test]
    async fn test_cached_token_reused() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(clock.clone(), vec![Ok(("t1", 3600))]));
        let provider = provider(source.clone(), clock);

        assert_eq!(provider.get_token().await.unwrap(), "t1");
        assert_eq!(provider.get_token().await.unwrap(), "t1");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_crossing_window() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(
            clock.clone(),
            vec![Ok(("t1", 3600)), Ok(("t2", 3600))],
        ));
        let provider = provider(source.clone(), clock.clone());

        assert_eq!(provider.get_token().await.unwrap(), "t1");
        clock.advance(chrono::Duration::seconds(3600 - 60));
        assert_eq!(provider.state().await, CacheState::Stale);

        assert_eq!(provider.get_token().await.unwrap(), "t2");
        assert_eq!(provider.get_token().await.unwrap(), "t2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(
            clock.clone(),
            vec![Err(AuthError::authentication("invalid_grant")), Ok(("t1", 3600))],
        ));
        let provider = provider(source.clone(), clock);

        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
        assert_eq!(provider.state().await, CacheState::Empty);

        assert_eq!(provider.get_token().await.unwrap(), "t1");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_state() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(
            clock.clone(),
            vec![Ok(("t1", 3600)), Err(AuthError::authentication("down"))],
        ));
        let provider = provider(source.clone(), clock.clone());

        provider.get_token().await.unwrap();
        clock.advance(chrono::Duration::hours(2));
        assert!(provider.get_token().await.is_err());
        assert_eq!(provider.state().await, CacheState::Stale);
        assert!(provider.get_token().await.unwrap().starts_with("extra-"));
    }

    #[tokio::test]
    async fn test_stale_on_arrival_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(clock.clone(), vec![Ok(("short", 30))]));
        let provider = provider(source, clock);

        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
        assert_eq!(provider.state().await, CacheState::Empty);
    }

    #[tokio::test]
    async fn test_refresh_rejected_reacquires_once() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(
            clock.clone(),
            vec![Ok(("t1", 3600)), Ok(("t2", 3600))],
        ));
        let provider = provider(source.clone(), clock);

        let first = provider.get_token().await.unwrap();
        assert_eq!(provider.refresh_rejected(&first).await.unwrap(), "t2");
        // A second caller holding the same stale token gets the replacement.
        assert_eq!(provider.refresh_rejected(&first).await.unwrap(), "t2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(ScriptedSource::new(clock.clone(), vec![]));
        let provider = provider(source.clone(), clock);

        provider.get_token().await.unwrap();
        assert!(provider.has_valid_token());
        provider.invalidate().await;
        assert!(!provider.has_valid_token());
        assert_eq!(provider.state().await, CacheState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_timeout() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(
            ScriptedSource::new(clock.clone(), vec![Ok(("slow", 3600))])
                .with_delay(Duration::from_secs(10)),
        );
        let provider = ExpiringTokenProvider::with_options(
            source,
            ProviderOptions::default().with_acquire_timeout(Duration::from_secs(1)),
        )
        .with_clock(clock);

        let err = provider.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout(d) if d == Duration::from_secs(1)));
        assert_eq!(provider.state().await, CacheState::Empty);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_acquisition() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = Arc::new(
            ScriptedSource::new(clock.clone(), vec![Ok(("t1", 3600)), Ok(("t2", 3600))])
                .with_delay(Duration::from_millis(50)),
        );
        let provider = Arc::new(provider(source.clone(), clock.clone()));

        provider.get_token().await.unwrap();
        clock.advance(chrono::Duration::seconds(3590));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get_token().await })
            })
            .collect();
        let tokens: Vec<String> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert!(tokens.iter().all(|t| t == "t2"));
        assert_eq!(source.calls(), 2);
    }

    proptest! {
        #[test]
        fn prop_no_reacquisition_before_boundary(
            lifetime in 120i64..86_400,
            advances in proptest::collection::vec(0i64..600, 1..20),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let clock = Arc::new(ManualClock::new(Utc::now()));
                let source = Arc::new(ScriptedSource::new(
                    clock.clone(),
                    vec![Ok(("only", lifetime))],
                ));
                let provider = provider(source.clone(), clock.clone());
                provider.get_token().await.unwrap();

                let boundary = lifetime - 60;
                let mut elapsed = 0;
                for step in advances {
                    if elapsed + step >= boundary {
                        break;
                    }
                    elapsed += step;
                    clock.advance(chrono::Duration::seconds(step));
                    assert_eq!(provider.get_token().await.unwrap(), "only");
                }
                assert_eq!(source.calls(), 1);
            });
        }
    }
}
