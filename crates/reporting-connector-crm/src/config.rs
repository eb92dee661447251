//! Salesforce client configuration.

use serde::{Deserialize, Serialize};

use reporting_connector::error::{ConnectorError, ConnectorResult};
use reporting_core::RetryConfig;

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "v58.0";

/// Default OAuth login endpoint.
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// How the client obtains an API session.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrmAuth {
    /// OAuth 2.0 JWT bearer flow with a connected-app certificate.
    JwtBearer {
        /// Connected app consumer key (`iss`).
        consumer_key: String,
        /// Integration user (`sub`).
        username: String,
        /// PEM-encoded RSA private key.
        private_key_pem: String,
    },
    /// Pre-issued access token.
    SessionToken { access_token: String },
}

impl std::fmt::Debug for CrmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrmAuth::JwtBearer {
                consumer_key,
                username,
                ..
            } => f
                .debug_struct("JwtBearer")
                .field("consumer_key", consumer_key)
                .field("username", username)
                .field("private_key_pem", &"***REDACTED***")
                .finish(),
            CrmAuth::SessionToken { .. } => f
                .debug_struct("SessionToken")
                .field("access_token", &"***REDACTED***")
                .finish(),
        }
    }
}

/// Salesforce client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Instance base URL (`https://example.my.salesforce.com`). The token
    /// response's `instance_url` takes precedence when present.
    pub instance_url: String,

    /// OAuth login endpoint used as token URL and JWT audience.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// REST API version segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Authentication mode.
    pub auth: CrmAuth,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connection_timeout_secs: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Verify server certificates.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,

    /// Retry policy for session establishment.
    #[serde(skip, default)]
    pub retry: RetryConfig,
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl CrmConfig {
    /// Create a configuration with default endpoints and timeouts.
    pub fn new(instance_url: impl Into<String>, auth: CrmAuth) -> Self {
        Self {
            instance_url: instance_url.into(),
            login_url: default_login_url(),
            api_version: default_api_version(),
            auth,
            connection_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            verify_certificate: true,
            retry: RetryConfig::default(),
        }
    }

    /// Set the OAuth login endpoint.
    #[must_use]
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    /// Set the retry policy for session establishment.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Normalize a host that may lack a scheme.
    #[must_use]
    pub fn normalize_url(host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }

    /// Validate required fields.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.instance_url.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "instance_url is required",
            ));
        }
        match &self.auth {
            CrmAuth::JwtBearer {
                consumer_key,
                username,
                private_key_pem,
            } => {
                if consumer_key.is_empty() || username.is_empty() {
                    return Err(ConnectorError::invalid_configuration(
                        "consumer_key and username are required",
                    ));
                }
                if !private_key_pem.contains("PRIVATE KEY") {
                    return Err(ConnectorError::invalid_configuration(
                        "private_key_pem is not a PEM private key",
                    ));
                }
            }
            CrmAuth::SessionToken { access_token } => {
                if access_token.is_empty() {
                    return Err(ConnectorError::invalid_configuration(
                        "access_token is required",
                    ));
                }
            }
        }
        Ok(())
    }
}
