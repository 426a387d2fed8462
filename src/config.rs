//! Broker configuration
//!
//! An explicit value passed at broker construction. Defaults point at the
//! production identity service; environment variables override individual
//! fields for other environments. There is no process-wide singleton.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default per-request deadline for ticket acquisition and both exchange
/// stages.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint and identity configuration for a [`TokenBroker`](crate::TokenBroker).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Stage-U endpoint (user token authentication)
    pub user_token_url: Url,
    /// Stage-X endpoint (relying-party token authorization)
    pub xsts_url: Url,
    /// Relying party named in the stage-U request
    pub auth_relying_party: String,
    /// Relying party assumed by `is_signed_in`
    pub default_relying_party: String,
    /// `SiteName` property of the stage-U request
    pub site_name: String,
    /// Sandbox identifier named in the stage-X request
    pub sandbox_id: String,
    /// `x-xbl-contract-version` header for stage U
    pub user_token_contract_version: String,
    /// `x-xbl-contract-version` header for stage X
    pub xsts_contract_version: String,
    /// Deadline applied to each network call; on expiry the attempt fails
    /// with a timeout error and cached state is unchanged
    pub request_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            user_token_url: Url::parse("https://user.auth.xboxlive.com/user/authenticate")
                .expect("default stage-U endpoint is a valid URL"),
            xsts_url: Url::parse("https://xsts.auth.xboxlive.com/xsts/authorize")
                .expect("default stage-X endpoint is a valid URL"),
            auth_relying_party: "http://auth.xboxlive.com".to_string(),
            default_relying_party: "http://xboxlive.com".to_string(),
            site_name: "user.auth.xboxlive.com".to_string(),
            sandbox_id: "RETAIL".to_string(),
            user_token_contract_version: "0".to_string(),
            xsts_contract_version: "1".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BrokerConfig {
    /// Builds a configuration from defaults with environment overrides:
    /// `XAL_USER_TOKEN_URL`, `XAL_XSTS_URL`, `XAL_SANDBOX_ID`,
    /// `XAL_SITE_NAME`, `XAL_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("XAL_USER_TOKEN_URL") {
            config.user_token_url = Url::parse(&value)
                .map_err(|e| ConfigError::InvalidUrl("XAL_USER_TOKEN_URL", e))?;
        }
        if let Ok(value) = std::env::var("XAL_XSTS_URL") {
            config.xsts_url =
                Url::parse(&value).map_err(|e| ConfigError::InvalidUrl("XAL_XSTS_URL", e))?;
        }
        if let Ok(value) = std::env::var("XAL_SANDBOX_ID") {
            config.sandbox_id = value;
        }
        if let Ok(value) = std::env::var("XAL_SITE_NAME") {
            config.site_name = value;
        }
        if let Ok(value) = std::env::var("XAL_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = value
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(value))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An endpoint override was not a parseable URL
    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, url::ParseError),

    /// The timeout override was not a number of seconds
    #[error("Invalid timeout value: {0}")]
    InvalidTimeout(String),
}
