//! Bearer credentials with an absolute expiry.

use chrono::{DateTime, Duration, Utc};

/// An opaque bearer token and the instant it stops being valid.
///
/// Credentials are immutable: a refresh produces a new `Credential` that
/// replaces the cached one.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Create a credential expiring at `expires_at`, or never if `None`.
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Create a credential with no known expiry.
    pub fn never_expiring(token: impl Into<String>) -> Self {
        Self::new(token, None)
    }

    /// Create a credential valid for `lifetime` from `now`.
    pub fn expiring_in(token: impl Into<String>, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self::new(token, Some(now + lifetime))
    }

    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry instant, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the credential stays valid for more than `window` after `now`.
    ///
    /// A credential without an expiry is always fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.expires_at {
            Some(expiry) => expiry
                .checked_sub_signed(window)
                .is_some_and(|deadline| deadline > now),
            None => true,
        }
    }

    /// Whether the credential is past its literal expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Consume the credential, returning the token.
    pub fn into_token(self) -> String {
        self.token
    }
}
