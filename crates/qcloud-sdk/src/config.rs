//! Client configuration.

use std::time::Duration;

use qcloud_auth::{IdentityConfig, ProviderOptions};

use crate::endpoints::{Endpoints, Environment};
use crate::error::{SdkError, SdkResult};
use crate::retry::RetryPolicy;
use crate::wait::WaitOptions;

/// Environment variable selecting the [`Environment`].
pub const ENV_VAR: &str = "QCLOUD_ENV";
pub const PROJECT_ID_VAR: &str = "QCLOUD_PROJECT_ID";
pub const WEBHOOK_VAR: &str = "QCLOUD_WEBHOOK";
/// Overrides the core API base URL of the selected environment.
pub const CORE_URL_VAR: &str = "QCLOUD_CORE_URL";
/// Overrides the account API base URL of the selected environment.
pub const ACCOUNT_URL_VAR: &str = "QCLOUD_ACCOUNT_URL";

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a client session needs besides credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub identity: IdentityConfig,
    pub project_id: Option<String>,
    /// Where the service posts results of finished batches.
    pub webhook: Option<String>,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub wait: WaitOptions,
    pub provider: ProviderOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl ClientConfig {
    /// Endpoints and identity provider of `env`, library defaults otherwise.
    pub fn for_environment(env: Environment) -> Self {
        Self {
            endpoints: env.endpoints(),
            identity: env.identity(),
            project_id: None,
            webhook: None,
            user_agent: format!("qcloud-sdk/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
            wait: WaitOptions::default(),
            provider: ProviderOptions::default(),
        }
    }

    /// Read `QCLOUD_ENV`, `QCLOUD_PROJECT_ID`, `QCLOUD_WEBHOOK` and the URL
    /// overrides.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_env_with(None)
    }

    /// Like [`from_env`](Self::from_env), but `env` takes precedence over
    /// `QCLOUD_ENV`. The URL overrides still apply on top of it.
    pub fn from_env_with(env: Option<Environment>) -> SdkResult<Self> {
        Self::from_vars(env, |var| std::env::var(var).ok())
    }

    fn from_vars(
        env: Option<Environment>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SdkResult<Self> {
        let read = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let env = match (env, read(ENV_VAR)) {
            (Some(env), _) => env,
            (None, Some(name)) => name.parse()?,
            (None, None) => Environment::default(),
        };
        let mut config = Self::for_environment(env);

        if let Some(core) = read(CORE_URL_VAR) {
            config.endpoints.core = core.trim_end_matches('/').to_string();
        }
        if let Some(account) = read(ACCOUNT_URL_VAR) {
            config.endpoints.account = account.trim_end_matches('/').to_string();
        }
        config.project_id = read(PROJECT_ID_VAR);
        config.webhook = read(WEBHOOK_VAR);
        Ok(config)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_webhook(mut self, webhook: impl Into<String>) -> Self {
        self.webhook = Some(webhook.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider = options;
        self
    }

    /// The configured project, or [`SdkError::MissingProjectId`].
    pub fn require_project_id(&self) -> SdkResult<&str> {
        self.project_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(SdkError::MissingProjectId)
    }
}
