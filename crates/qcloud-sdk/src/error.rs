//! Error types for the cloud SDK.

use qcloud_auth::AuthError;
use thiserror::Error;

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors that can occur when talking to the cloud service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SdkError {
    /// Token acquisition failed, or the service kept rejecting the token.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-success response from the service.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The token was accepted but lacks the required permissions.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An authenticated endpoint was called on a client without credentials.
    #[error("Authentication required: provide credentials when creating the client")]
    Unauthenticated,

    /// The operation needs a project and none is configured.
    #[error("Missing project ID (set QCLOUD_PROJECT_ID)")]
    MissingProjectId,

    /// Rejected filter or pagination value.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A wait did not observe a terminal status in time.
    #[error("Timed out waiting for {resource} {id}")]
    Timeout { resource: &'static str, id: String },

    /// A results document could not be interpreted.
    #[error("Invalid results: {0}")]
    InvalidResults(String),
}

impl SdkError {
    /// Whether the failure may clear up if the same request is repeated.
    ///
    /// The wait loop keeps polling through transient errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => matches!(status, 408 | 425 | 429) || *status >= 500,
            Self::Auth(AuthError::Timeout(_)) => true,
            _ => false,
        }
    }

    /// Whether the error came from token acquisition or a rejected token.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Unauthenticated)
    }
}
