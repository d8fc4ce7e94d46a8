//! Token acquisition strategies.
//!
//! A [`TokenSource`] knows *how* to obtain a credential. It knows nothing
//! about caching; [`ExpiringTokenProvider`](crate::ExpiringTokenProvider)
//! decides *when* to call it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credential::Credential;
use crate::error::AuthResult;

/// Capability to obtain a fresh [`Credential`].
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a new credential. Called only when the cached one is absent
    /// or stale.
    async fn acquire(&self) -> AuthResult<Credential>;

    /// Short label used in log events.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn acquire(&self) -> AuthResult<Credential> {
        (**self).acquire().await
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

/// A pre-supplied token.
pub struct StaticTokenSource {
    credential: Credential,
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource")
            .field("expires_at", &self.credential.expires_at())
            .finish_non_exhaustive()
    }
}

impl StaticTokenSource {
    /// A token that never expires.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::never_expiring(token),
        }
    }

    /// A token that expires at a caller-supplied instant.
    pub fn expiring_at(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            credential: Credential::new(token, Some(expires_at)),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn acquire(&self) -> AuthResult<Credential> {
        Ok(self.credential.clone())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Adapts an async closure into a [`TokenSource`].
///
/// ```ignore
/// let source = FnTokenSource::new(|| async {
///     let token = vault.read("qcloud/token").await?;
///     Ok(Credential::never_expiring(token))
/// });
/// ```
pub struct FnTokenSource<F> {
    f: F,
}

impl<F> FnTokenSource<F> {
    /// Wrap an async closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TokenSource for FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AuthResult<Credential>> + Send,
{
    async fn acquire(&self) -> AuthResult<Credential> {
        (self.f)().await
    }
}
