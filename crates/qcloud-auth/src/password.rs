//! Resource-owner password grant against the identity provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::jwt::expiry_from_jwt;
use crate::secret::SecretSource;
use crate::source::TokenSource;

/// Grant type understood by Auth0 tenants with realm support.
pub const PASSWORD_REALM_GRANT: &str = "http://auth0.com/oauth/grant-type/password-realm";

/// Plain OAuth2 password grant (Keycloak).
pub const PASSWORD_GRANT: &str = "password";

const DEFAULT_SCOPE: &str = "openid profile email";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity-provider settings for the password grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// OAuth token endpoint.
    pub token_endpoint: String,

    /// Public client id.
    pub client_id: String,

    /// API audience the token is minted for.
    pub audience: String,

    /// User realm (Auth0 connection or Keycloak realm).
    pub realm: String,

    /// `grant_type` form value.
    pub grant_type: String,

    /// Space-separated scopes.
    pub scope: String,
}

impl IdentityConfig {
    /// Configuration for an Auth0 tenant using the password-realm grant.
    pub fn auth0(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        audience: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            audience: audience.into(),
            realm: realm.into(),
            grant_type: PASSWORD_REALM_GRANT.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    /// Configuration for a Keycloak realm using the plain password grant.
    pub fn keycloak(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        audience: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: PASSWORD_GRANT.to_string(),
            ..Self::auth0(token_endpoint, client_id, audience, realm)
        }
    }

    /// Override the token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Override the requested scopes.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

#[derive(Serialize)]
struct PasswordGrantForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    username: &'a str,
    password: &'a str,
    audience: &'a str,
    scope: &'a str,
    realm: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Acquires tokens with a username and a password from a [`SecretSource`].
pub struct PasswordGrantSource {
    identity: IdentityConfig,
    username: String,
    secret: Arc<dyn SecretSource>,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
}

impl std::fmt::Debug for PasswordGrantSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrantSource")
            .field("token_endpoint", &self.identity.token_endpoint)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PasswordGrantSource {
    /// Create a password-grant source.
    ///
    /// Fails with [`AuthError::Configuration`] if `username` is empty.
    pub fn new(
        identity: IdentityConfig,
        username: impl Into<String>,
        secret: Arc<dyn SecretSource>,
    ) -> AuthResult<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(AuthError::configuration("username must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            identity,
            username,
            secret,
            client,
            clock: Arc::new(SystemClock),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Use a specific clock to turn `expires_in` into an instant.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reuse an existing HTTP client. Its own timeout applies.
    pub fn with_http_client(mut self, client: reqwest::Client, timeout: Duration) -> Self {
        self.client = client;
        self.request_timeout = timeout;
        self
    }

    /// The identity provider this source talks to.
    pub fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    fn credential_from(&self, response: TokenResponse) -> Credential {
        // Lifetimes too large to represent fall back to the JWT claim.
        let expires_at = response
            .expires_in
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .and_then(|secs| chrono::Duration::try_milliseconds((secs * 1000.0) as i64))
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .or_else(|| expiry_from_jwt(&response.access_token));
        Credential::new(response.access_token, expires_at)
    }
}

#[async_trait]
impl TokenSource for PasswordGrantSource {
    #[instrument(skip(self), fields(endpoint = %self.identity.token_endpoint, username = %self.username))]
    async fn acquire(&self) -> AuthResult<Credential> {
        let password = self.secret.secret().await?;

        let form = PasswordGrantForm {
            client_id: &self.identity.client_id,
            client_secret: "",
            username: &self.username,
            password: &password,
            audience: &self.identity.audience,
            scope: &self.identity.scope,
            realm: &self.identity.realm,
            grant_type: &self.identity.grant_type,
        };

        debug!("requesting access token");

        let response = self
            .client
            .post(&self.identity.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Timeout(self.request_timeout)
                } else {
                    AuthError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let reason = detail
                .error_description
                .or(detail.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AuthError::Authentication(format!(
                "identity provider rejected the credentials: {reason}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AuthError::Authentication(format!("malformed token response: {e}"))
        })?;
        if token.access_token.is_empty() {
            return Err(AuthError::authentication(
                "identity provider returned an empty access token",
            ));
        }

        let credential = self.credential_from(token);
        info!(expires_at = ?credential.expires_at(), "access token acquired");
        Ok(credential)
    }

    fn kind(&self) -> &'static str {
        "password"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::secret::FixedSecret;
    use crate::jwt::tests::token_with;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use chrono::Utc;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Forms = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Serve a token endpoint answering every grant with `status` and
    /// `reply`, recording the submitted forms.
    async fn token_endpoint(status: StatusCode, reply: Value) -> (String, Forms) {
        let forms: Forms = Arc::default();
        let seen = forms.clone();
        let app = Router::new().route(
            "/oauth/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let reply = reply.clone();
                seen.lock().unwrap().push(form);
                async move { (status, Json(reply)) }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/oauth/token"), forms)
    }

    fn identity() -> IdentityConfig {
        IdentityConfig::auth0(
            "http://127.0.0.1:9/oauth/token",
            "client",
            "https://api.example/account/api/v1",
            "users",
        )
    }

    #[test]
    fn test_identity_presets() {
        let auth0 = identity();
        assert_eq!(auth0.grant_type, PASSWORD_REALM_GRANT);
        assert_eq!(auth0.scope, "openid profile email");

        let kc = IdentityConfig::keycloak("https://kc/token", "cloud-sdk", "aud", "realm");
        assert_eq!(kc.grant_type, "password");
        assert_eq!(kc.client_id, "cloud-sdk");
    }

    #[test]
    fn test_empty_username_rejected() {
        let err = PasswordGrantSource::new(identity(), "  ", Arc::new(FixedSecret::new("pw")))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_expiry_from_expires_in() {
        let now = Utc::now();
        let source = PasswordGrantSource::new(identity(), "me", Arc::new(FixedSecret::new("pw")))
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(now)));

        let cred = source.credential_from(TokenResponse {
            access_token: "opaque".into(),
            expires_in: Some(3600.0),
        });
        assert_eq!(cred.expires_at(), Some(now + chrono::Duration::seconds(3600)));
    }

    #[test]
    fn test_expiry_falls_back_to_jwt_claim() {
        let source = PasswordGrantSource::new(identity(), "me", Arc::new(FixedSecret::new("pw")))
            .unwrap();
        let cred = source.credential_from(TokenResponse {
            access_token: token_with(serde_json::json!({"exp": 2_000_000_000})),
            expires_in: None,
        });
        assert_eq!(cred.expires_at().map(|t| t.timestamp()), Some(2_000_000_000));
    }

    #[test]
    fn test_huge_expires_in_does_not_overflow() {
        let source = PasswordGrantSource::new(identity(), "me", Arc::new(FixedSecret::new("pw")))
            .unwrap();

        let opaque = source.credential_from(TokenResponse {
            access_token: "opaque".into(),
            expires_in: Some(1e18),
        });
        assert!(opaque.expires_at().is_none());

        let jwt = source.credential_from(TokenResponse {
            access_token: token_with(serde_json::json!({"exp": 2_000_000_000})),
            expires_in: Some(1e18),
        });
        assert_eq!(jwt.expires_at().map(|t| t.timestamp()), Some(2_000_000_000));
    }

    #[test]
    fn test_unknown_expiry() {
        let source = PasswordGrantSource::new(identity(), "me", Arc::new(FixedSecret::new("pw")))
            .unwrap();
        let cred = source.credential_from(TokenResponse {
            access_token: "opaque".into(),
            expires_in: None,
        });
        assert!(cred.expires_at().is_none());
    }

    #[tokio::test]
    async fn test_password_grant_posts_form() {
        let reply = json!({"access_token": "tok-a", "expires_in": 3600});
        let (endpoint, forms) = token_endpoint(StatusCode::OK, reply).await;
        let now = Utc::now();
        let identity = IdentityConfig::auth0(endpoint, "client", "https://aud", "users");
        let secret = Arc::new(FixedSecret::new("pw"));
        let source = PasswordGrantSource::new(identity, "me@example.com", secret)
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(now)));

        let cred = source.acquire().await.unwrap();
        assert_eq!(cred.token(), "tok-a");
        assert_eq!(cred.expires_at(), Some(now + chrono::Duration::seconds(3600)));

        let forms = forms.lock().unwrap();
        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form["grant_type"], PASSWORD_REALM_GRANT);
        assert_eq!(form["username"], "me@example.com");
        assert_eq!(form["password"], "pw");
        assert_eq!(form["client_id"], "client");
        assert_eq!(form["audience"], "https://aud");
        assert_eq!(form["realm"], "users");
        assert_eq!(form["scope"], "openid profile email");
    }

    #[tokio::test]
    async fn test_rejected_grant_reports_description() {
        let (endpoint, _) = token_endpoint(
            StatusCode::FORBIDDEN,
            json!({"error": "invalid_grant", "error_description": "Wrong email or password."}),
        )
        .await;
        let identity = IdentityConfig::keycloak(endpoint, "cloud-sdk", "aud", "realm");
        let source = PasswordGrantSource::new(identity, "me", Arc::new(FixedSecret::new("nope")))
            .unwrap();

        let err = source.acquire().await.unwrap_err();
        assert!(
            matches!(err, AuthError::Authentication(ref m) if m.contains("Wrong email or password."))
        );
    }

    #[tokio::test]
    async fn test_empty_access_token_rejected() {
        let (endpoint, _) = token_endpoint(StatusCode::OK, json!({"access_token": ""})).await;
        let identity = IdentityConfig::auth0(endpoint, "client", "aud", "users");
        let source = PasswordGrantSource::new(identity, "me", Arc::new(FixedSecret::new("pw")))
            .unwrap();

        let err = source.acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let source = PasswordGrantSource::new(identity(), "me", Arc::new(FixedSecret::new("pw")))
            .unwrap();
        let debug = format!("{source:?}");
        assert!(debug.contains("me"));
        assert!(!debug.contains("pw\""));
    }
}
