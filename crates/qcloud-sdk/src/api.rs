//! Authenticated HTTP requester for the cloud REST API.
//!
//! ## Request flow
//!
//! 1. Ask the token provider for a bearer token (cached unless stale)
//! 2. Send the request, retrying transient failures per [`RetryPolicy`];
//!    every attempt asks the provider again
//! 3. On `401`, replace the rejected token once and resend
//! 4. Decode the JSend envelope, or map the status to an [`SdkError`]
//!
//! [`RetryPolicy`]: crate::retry::RetryPolicy

use std::sync::Arc;

use qcloud_auth::{AuthError, TokenProvider};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{SdkError, SdkResult};
use crate::model::{JSend, JobResult};

/// Low-level client: one method per kind of exchange, no resource logic.
#[derive(Clone)]
pub struct CloudClient {
    http: Client,
    config: Arc<ClientConfig>,
    provider: Option<Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("core", &self.config.endpoints.core)
            .field("account", &self.config.endpoints.account)
            .field("project_id", &self.config.project_id)
            .field("authenticated", &self.provider.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl CloudClient {
    /// Create a client. Without a provider only public endpoints work.
    pub fn new(config: ClientConfig, provider: Option<Arc<dyn TokenProvider>>) -> SdkResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(SdkError::Http)?;

        Ok(Self {
            http,
            config: Arc::new(config),
            provider,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.provider.is_some()
    }

    /// Full URL of a core API path.
    pub fn core_url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoints.core, path)
    }

    /// Full URL of an account API path.
    pub fn account_url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoints.account, path)
    }

    /// Current bearer token, or `None` for an anonymous client.
    pub async fn user_token(&self) -> SdkResult<Option<String>> {
        match &self.provider {
            Some(provider) => Ok(Some(provider.get_token().await?)),
            None => Ok(None),
        }
    }

    // ─── Requests ───────────────────────────────────────────────────

    /// Send an authenticated request and decode its JSend envelope.
    ///
    /// A `401` triggers exactly one token replacement and resend; a second
    /// `401` surfaces as [`SdkError::Auth`].
    #[instrument(skip(self, body, query), fields(%method))]
    pub async fn authenticated_request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> SdkResult<JSend<T>> {
        let provider = self.provider.as_deref().ok_or(SdkError::Unauthenticated)?;
        let mut refreshed = false;

        loop {
            let (response, token) = self
                .send_with_retry(&method, url, body, query, Some(provider))
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                debug!("token rejected, refreshing and retrying once");
                refreshed = true;
                if let Some(rejected) = token {
                    provider.refresh_rejected(&rejected).await?;
                }
                continue;
            }

            return self.handle_response(response).await;
        }
    }

    /// Follow `pagination` until every item of a listing is collected.
    #[instrument(skip(self, body, query), fields(%method))]
    pub async fn request_all_pages<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> SdkResult<Vec<T>> {
        let mut query: Vec<(&str, String)> = query.to_vec();
        let first: JSend<Vec<T>> = self
            .authenticated_request(method.clone(), url, body, &query)
            .await?;

        let mut items = first.data;
        let Some(mut pagination) = first.pagination else {
            return Ok(items);
        };

        while pagination.end < pagination.total {
            query.retain(|(key, _)| *key != "offset");
            query.push(("offset", pagination.end.to_string()));
            debug!(offset = pagination.end, total = pagination.total, "fetching next page");

            let page: JSend<Vec<T>> = self
                .authenticated_request(method.clone(), url, body, &query)
                .await?;
            items.extend(page.data);

            match page.pagination {
                Some(next) if next.end > pagination.end => pagination = next,
                _ => break,
            }
        }

        Ok(items)
    }

    /// Send an unauthenticated request to a public endpoint.
    #[instrument(skip(self, query), fields(%method))]
    pub async fn public_request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> SdkResult<JSend<T>> {
        let (response, _) = self.send_with_retry(&method, url, None, query, None).await?;
        self.handle_response(response).await
    }

    /// Download a results document from a presigned link.
    ///
    /// The link carries its own authorization; no bearer token is sent.
    #[instrument(skip(self, link))]
    pub async fn download_results(&self, link: &str) -> SdkResult<JobResult> {
        let (response, _) = self
            .send_with_retry(&Method::GET, link, None, &[], None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::Api {
                status: status.as_u16(),
                message: format!("results download failed: {}", response.text().await.unwrap_or_default()),
            });
        }

        let value: Value = serde_json::from_str(&response.text().await?)
            .map_err(|e| SdkError::InvalidResults(format!("results are not JSON: {e}")))?;
        if !value.is_object() {
            return Err(SdkError::InvalidResults(
                "results document is not a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| SdkError::InvalidResults(e.to_string()))
    }

    // ─── Plumbing ───────────────────────────────────────────────────

    /// Send with retries, asking `provider` for a token before every
    /// attempt. Returns the final response and the token it carried.
    async fn send_with_retry(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
        provider: Option<&dyn TokenProvider>,
    ) -> SdkResult<(reqwest::Response, Option<String>)> {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            let token = match provider {
                Some(provider) => Some(provider.get_token().await?),
                None => None,
            };
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !policy.should_retry_status(status, attempt) {
                        return Ok((response, token));
                    }
                    let delay = policy.delay_for(attempt);
                    warn!(status, attempt, ?delay, "retryable status, backing off");
                    sleep(delay).await;
                }
                Err(e) if policy.should_retry_error(method, &e, attempt) => {
                    let delay = policy.delay_for(attempt);
                    warn!(error = %e, attempt, ?delay, "connection failure, backing off");
                    sleep(delay).await;
                }
                Err(e) => return Err(SdkError::Http(e)),
            }
            attempt += 1;
        }
    }

    /// Decode a success body or map the failure status.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> SdkResult<JSend<T>> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let message = error_message(&text);
        match status {
            StatusCode::UNAUTHORIZED => Err(SdkError::Auth(AuthError::Authentication(format!(
                "the service rejected the bearer token: {message}"
            )))),
            StatusCode::FORBIDDEN => Err(SdkError::Forbidden(message)),
            StatusCode::NOT_FOUND => Err(SdkError::NotFound(message)),
            _ => Err(SdkError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

/// Best human-readable message from an error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            data,
        }) => match data {
            Some(Value::Object(detail)) if !detail.is_empty() => {
                format!("{message} ({})", Value::Object(detail))
            }
            _ => message,
        },
        _ if body.is_empty() => "no response body".to_string(),
        _ => body.to_string(),
    }
}
