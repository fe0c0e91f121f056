//! OpenID relying party configuration.

use crate::ax::AxAttribute;
use crate::error::{OpenIdError, OpenIdResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Google's OpenID endpoint for consumer accounts.
pub const GOOGLE_ENDPOINT: &str = "https://www.google.com/accounts/o8/ud";

/// Upper bound for `nonce_max_age_seconds` (one day)
pub const MAX_NONCE_AGE_SECONDS: u64 = 86_400;

/// Upper bound for `clock_skew_seconds` (one hour)
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 3_600;

/// OpenID relying party configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenIdConfig {
    pub provider_id: String,
    /// Provider endpoint. Discovery is not supported, so this must be the
    /// OP endpoint itself.
    pub endpoint: String,
    /// Attributes requested through attribute exchange
    pub ask_for: Vec<AxAttribute>,
    pub http_timeout_seconds: u64,
    /// How old a response nonce may be before it is refused
    pub nonce_max_age_seconds: u64,
    /// How far in the future a response nonce may be dated
    pub clock_skew_seconds: u64,
}

impl Default for OpenIdConfig {
    fn default() -> Self {
        Self {
            provider_id: "google".to_string(),
            endpoint: GOOGLE_ENDPOINT.to_string(),
            ask_for: AxAttribute::default_set(),
            http_timeout_seconds: 30,
            nonce_max_age_seconds: 300, // 5 minutes
            clock_skew_seconds: 60,
        }
    }
}

impl OpenIdConfig {
    /// Google OpenID for any Google account.
    pub fn google() -> Self {
        Self::default()
    }

    /// Google Federated Login for a single Google Apps domain.
    pub fn google_apps(domain: &str) -> Self {
        Self {
            provider_id: format!("google-apps:{}", domain.trim().to_ascii_lowercase()),
            endpoint: format!("https://www.google.com/a/{}/o8/ud?be=o8", domain.trim()),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_ask_for(mut self, attributes: Vec<AxAttribute>) -> Self {
        self.ask_for = attributes;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn with_nonce_max_age(mut self, seconds: u64) -> Self {
        self.nonce_max_age_seconds = seconds;
        self
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    /// Checks the timing settings.
    pub fn validate(&self) -> OpenIdResult<()> {
        if self.http_timeout_seconds == 0 {
            return Err(OpenIdError::ConfigError(
                "HTTP timeout must be positive".to_string(),
            ));
        }
        if self.nonce_max_age_seconds == 0 || self.nonce_max_age_seconds > MAX_NONCE_AGE_SECONDS {
            return Err(OpenIdError::ConfigError(format!(
                "Nonce max age must be between 1 and {} seconds, got {}",
                MAX_NONCE_AGE_SECONDS, self.nonce_max_age_seconds
            )));
        }
        if self.clock_skew_seconds > MAX_CLOCK_SKEW_SECONDS {
            return Err(OpenIdError::ConfigError(format!(
                "Clock skew must be at most {} seconds, got {}",
                MAX_CLOCK_SKEW_SECONDS, self.clock_skew_seconds
            )));
        }
        Ok(())
    }

    /// Parses and checks the endpoint.
    pub fn endpoint_url(&self) -> OpenIdResult<Url> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "https" | "http" => {}
            other => {
                return Err(OpenIdError::ConfigError(format!(
                    "Unsupported endpoint scheme '{}'",
                    other
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(OpenIdError::ConfigError(
                "Endpoint must include a host".to_string(),
            ));
        }
        Ok(url)
    }
}
