//! How a session authenticates.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{AuthError, AuthResult};
use crate::password::{IdentityConfig, PasswordGrantSource};
use crate::provider::{ExpiringTokenProvider, ProviderOptions};
use crate::secret::{FixedSecret, PromptSecret, SecretSource};
use crate::source::{StaticTokenSource, TokenSource};

/// Environment variable holding a pre-issued bearer token.
pub const TOKEN_ENV: &str = "QCLOUD_TOKEN";
/// Environment variable holding the account username.
pub const USERNAME_ENV: &str = "QCLOUD_USERNAME";
/// Environment variable holding the account password.
pub const PASSWORD_ENV: &str = "QCLOUD_PASSWORD";

/// Authentication choice for a client session.
#[derive(Clone)]
pub enum AuthConfig {
    /// Password grant. A missing password is prompted for on the terminal
    /// when a token is first needed.
    CredentialsByPassword {
        username: String,
        password: Option<String>,
    },

    /// A pre-issued token, optionally with a known expiry.
    StaticToken {
        token: String,
        expires_at: Option<DateTime<Utc>>,
    },

    /// Any other acquisition strategy.
    Custom(Arc<dyn TokenSource>),
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialsByPassword { username, password } => f
                .debug_struct("CredentialsByPassword")
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Self::StaticToken { expires_at, .. } => f
                .debug_struct("StaticToken")
                .field("token", &"[REDACTED]")
                .field("expires_at", expires_at)
                .finish(),
            Self::Custom(source) => f.debug_tuple("Custom").field(&source.kind()).finish(),
        }
    }
}

impl AuthConfig {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::CredentialsByPassword {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    pub fn prompted(username: impl Into<String>) -> Self {
        Self::CredentialsByPassword {
            username: username.into(),
            password: None,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self::StaticToken {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Read credentials from `QCLOUD_TOKEN` or `QCLOUD_USERNAME` /
    /// `QCLOUD_PASSWORD`.
    ///
    /// Returns `Ok(None)` when neither is set. Setting both a token and a
    /// username is a configuration error.
    pub fn from_env() -> AuthResult<Option<Self>> {
        let read = |var: &str| std::env::var(var).ok().filter(|v| !v.is_empty());
        Self::from_values(read(TOKEN_ENV), read(USERNAME_ENV), read(PASSWORD_ENV))
    }

    fn from_values(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> AuthResult<Option<Self>> {
        match (token, username) {
            (Some(_), Some(_)) => Err(AuthError::Configuration(format!(
                "{TOKEN_ENV} and {USERNAME_ENV} are mutually exclusive"
            ))),
            (Some(token), None) => Ok(Some(Self::token(token))),
            (None, Some(username)) => Ok(Some(Self::CredentialsByPassword { username, password })),
            (None, None) if password.is_some() => Err(AuthError::Configuration(format!(
                "{PASSWORD_ENV} is set but {USERNAME_ENV} is not"
            ))),
            (None, None) => Ok(None),
        }
    }

    /// Whether acquisition goes through the identity provider's password
    /// grant.
    pub fn is_password(&self) -> bool {
        matches!(self, Self::CredentialsByPassword { .. })
    }

    /// Build the token source this configuration describes.
    pub fn into_source(
        self,
        identity: &IdentityConfig,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Arc<dyn TokenSource>> {
        match self {
            Self::CredentialsByPassword { username, password } => {
                let secret: Arc<dyn SecretSource> = match password {
                    Some(p) if p.is_empty() => {
                        return Err(AuthError::configuration("password must not be empty"));
                    }
                    Some(p) => Arc::new(FixedSecret::new(p)),
                    None => Arc::new(PromptSecret::default()),
                };
                let source =
                    PasswordGrantSource::new(identity.clone(), username, secret)?.with_clock(clock);
                Ok(Arc::new(source))
            }
            Self::StaticToken { token, expires_at } => {
                if token.trim().is_empty() {
                    return Err(AuthError::configuration("token must not be empty"));
                }
                Ok(Arc::new(match expires_at {
                    Some(at) => StaticTokenSource::expiring_at(token, at),
                    None => StaticTokenSource::new(token),
                }))
            }
            Self::Custom(source) => Ok(source),
        }
    }

    /// Build an [`ExpiringTokenProvider`] for this configuration.
    pub fn into_provider(
        self,
        identity: &IdentityConfig,
        options: ProviderOptions,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<ExpiringTokenProvider> {
        let source = self.into_source(identity, clock.clone())?;
        Ok(ExpiringTokenProvider::with_options(source, options).with_clock(clock))
    }
}
