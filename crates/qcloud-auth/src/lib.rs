//! qcloud authentication
//!
//! Bearer-token lifecycle for the qcloud SDK: a cached credential that is
//! re-acquired lazily shortly before it expires, with pluggable acquisition.
//!
//! # Overview
//!
//! - [`ExpiringTokenProvider`] caches one [`Credential`] and refreshes it when
//!   it enters the safety window (60 s by default)
//! - [`TokenSource`] is how a credential is obtained: a static token, the
//!   identity provider's password grant, or anything user-supplied
//! - [`TokenProvider`] is the object-safe trait HTTP consumers depend on
//!
//! # Sources
//!
//! | Source | Config | Expiry |
//! |--------|--------|--------|
//! | [`StaticTokenSource`] | `QCLOUD_TOKEN` | none, or caller-supplied |
//! | [`PasswordGrantSource`] | `QCLOUD_USERNAME` / `QCLOUD_PASSWORD` | `expires_in`, else JWT `exp` |
//! | [`FnTokenSource`] / custom | [`AuthConfig::Custom`] | whatever the source reports |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qcloud_auth::{AuthConfig, IdentityConfig, ProviderOptions, SystemClock};
//!
//! let identity = IdentityConfig::auth0(
//!     "https://tenant.eu.auth0.com/oauth/token",
//!     "client-id",
//!     "https://apis.example.cloud/account/api/v1",
//!     "users",
//! );
//! let provider = AuthConfig::password("me@example.com", "secret")
//!     .into_provider(&identity, ProviderOptions::default(), Arc::new(SystemClock))?;
//!
//! // Acquires on first use, then serves the cached token.
//! let token = provider.get_token().await?;
//! ```

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod jwt;
pub mod password;
pub mod provider;
pub mod secret;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use credential::Credential;
pub use error::{AuthError, AuthResult};
pub use password::{IdentityConfig, PasswordGrantSource};
pub use provider::{
    CacheState, DEFAULT_SAFETY_WINDOW, ExpiringTokenProvider, ProviderOptions, TokenProvider,
};
pub use secret::{EnvSecret, FixedSecret, PromptSecret, SecretSource};
pub use source::{FnTokenSource, StaticTokenSource, TokenSource};
