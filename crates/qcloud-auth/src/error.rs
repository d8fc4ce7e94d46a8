//! Error types for token acquisition.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by token providers and token sources.
///
/// None of these are retried inside the provider: a failed acquisition is
/// reported to the caller and the next `get_token()` call starts over.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The acquisition mechanism rejected or failed to produce a credential
    /// (bad password, identity-provider error, network failure, declined
    /// prompt).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Acquisition exceeded its time budget.
    #[error("Token acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// The provider was configured with insufficient or conflicting options.
    #[error("Authentication configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Shorthand for [`AuthError::Authentication`].
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Shorthand for [`AuthError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not report the configured budget back to us.
            AuthError::Authentication(format!("identity provider request timed out: {e}"))
        } else {
            AuthError::Authentication(format!("identity provider request failed: {e}"))
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
