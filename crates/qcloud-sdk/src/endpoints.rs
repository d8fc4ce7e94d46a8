//! Service environments and their endpoints.
//!
//! Each [`Environment`] resolves to a pair of API base URLs and the identity
//! provider used for the password grant. These are plain values passed to
//! the client; nothing is read from global state.

use std::fmt;
use std::str::FromStr;

use qcloud_auth::IdentityConfig;
use serde::{Deserialize, Serialize};

use crate::error::SdkError;

const AUDIENCE: &str = "https://apis.pasqal.cloud/account/api/v1";
const PREPROD_AUDIENCE: &str = "https://apis.preprod.pasqal.cloud/account/api/v1";
const DEV_AUDIENCE: &str = "https://apis.dev.pasqal.cloud/account/api/v1";

const AUTH0_REALM: &str = "pcs-users";
const KEYCLOAK_REALM: &str = "pasqal-cloud";
const KEYCLOAK_CLIENT_ID: &str = "cloud-sdk";

/// Base URLs of the two APIs the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Batches, jobs, workloads and devices.
    pub core: String,
    /// Users and projects.
    pub account: String,
}

impl Endpoints {
    /// Explicit endpoints. Trailing slashes are dropped.
    pub fn new(core: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            core: core.into().trim_end_matches('/').to_string(),
            account: account.into().trim_end_matches('/').to_string(),
        }
    }

    /// Both APIs served from one host, as in a local mock.
    pub fn single_host(base: impl Into<String>) -> Self {
        let base = base.into();
        Self::new(format!("{base}/core-fast"), format!("{base}/account"))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Environment::Prod.endpoints()
    }
}

/// A deployment of the cloud service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    #[default]
    Prod,
    Preprod,
    Dev,
    /// Saudi-Arabia region.
    SaProd,
    SaPreprod,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Prod,
        Environment::Preprod,
        Environment::Dev,
        Environment::SaProd,
        Environment::SaPreprod,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Preprod => "preprod",
            Self::Dev => "dev",
            Self::SaProd => "sa-prod",
            Self::SaPreprod => "sa-preprod",
        }
    }

    /// API base URLs for this environment.
    pub fn endpoints(self) -> Endpoints {
        let host = match self {
            Self::Prod => "apis.pasqal.cloud",
            Self::Preprod => "apis.preprod.pasqal.cloud",
            Self::Dev => "apis.dev.pasqal.cloud",
            Self::SaProd => "apis.sa.pasqal.cloud",
            Self::SaPreprod => "apis.preprod.sa.pasqal.cloud",
        };
        Endpoints::single_host(format!("https://{host}"))
    }

    /// Identity provider for the password grant.
    ///
    /// The Saudi-Arabia region uses Keycloak; the others use Auth0.
    pub fn identity(self) -> IdentityConfig {
        match self {
            Self::Prod => IdentityConfig::auth0(
                "https://pasqal.eu.auth0.com/oauth/token",
                "PeZvo7Atx7IVv3iel59asJSb4Ig7vuSB",
                AUDIENCE,
                AUTH0_REALM,
            ),
            Self::Preprod => IdentityConfig::auth0(
                "https://pasqal-preprod.eu.auth0.com/oauth/token",
                "2l6A2ldvwJE5sdkghu40BTYLm7sSUAv9",
                PREPROD_AUDIENCE,
                AUTH0_REALM,
            ),
            Self::Dev => IdentityConfig::auth0(
                "https://pasqal-dev.eu.auth0.com/oauth/token",
                "5QtfSu1UV118Iz6By6IJRSNoDrLbAiOv",
                DEV_AUDIENCE,
                AUTH0_REALM,
            ),
            Self::SaProd => IdentityConfig::keycloak(
                "https://auth.sa.pasqal.cloud/realms/pasqal-cloud/protocol/openid-connect/token",
                KEYCLOAK_CLIENT_ID,
                AUDIENCE,
                KEYCLOAK_REALM,
            ),
            Self::SaPreprod => IdentityConfig::keycloak(
                "https://auth.preprod.sa.pasqal.cloud/realms/pasqal-cloud/protocol/openid-connect/token",
                KEYCLOAK_CLIENT_ID,
                PREPROD_AUDIENCE,
                KEYCLOAK_REALM,
            ),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Self::Prod),
            "preprod" => Ok(Self::Preprod),
            "dev" => Ok(Self::Dev),
            "sa-prod" | "sa" => Ok(Self::SaProd),
            "sa-preprod" => Ok(Self::SaPreprod),
            other => Err(SdkError::Configuration(format!(
                "unknown environment '{other}' (expected one of: prod, preprod, dev, sa-prod, sa-preprod)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prod_endpoints() {
        let endpoints = Environment::Prod.endpoints();
        assert_eq!(endpoints.core, "https://apis.pasqal.cloud/core-fast");
        assert_eq!(endpoints.account, "https://apis.pasqal.cloud/account");
        assert_eq!(Endpoints::default(), endpoints);
    }

    #[test]
    fn test_sa_uses_keycloak() {
        let identity = Environment::SaProd.identity();
        assert_eq!(identity.grant_type, "password");
        assert_eq!(identity.client_id, "cloud-sdk");
        assert_eq!(identity.realm, "pasqal-cloud");

        let identity = Environment::Dev.identity();
        assert_eq!(
            identity.grant_type,
            "http://auth0.com/oauth/grant-type/password-realm"
        );
        assert_eq!(identity.audience, DEV_AUDIENCE);
    }

    #[test]
    fn test_parse_round_trip() {
        for env in Environment::ALL {
            assert_eq!(env.as_str().parse::<Environment>().unwrap(), env);
        }
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let endpoints = Endpoints::new("http://localhost:8080/core/", "http://localhost:8080/acc/");
        assert_eq!(endpoints.core, "http://localhost:8080/core");
        assert_eq!(endpoints.account, "http://localhost:8080/acc");
    }
}
