//! OpenID 2.0 client: authentication requests and stateless verification.

use crate::ax::{self, AxClaims};
use crate::config::OpenIdConfig;
use crate::error::{OpenIdError, OpenIdResult};
use crate::nonce::{NonceStore, nonce_timestamp};
use crate::types::{
    AssertionClaims, CheckAuthenticationResponse, IDENTIFIER_SELECT, OPENID_NS, SignedFields,
};
use chrono::{DateTime, TimeDelta, Utc};
use fedauth_identity_core::CallbackParams;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// OpenID client for a single provider endpoint.
///
/// Discovery and associations are not supported: assertions are always
/// confirmed with a `check_authentication` request to the configured endpoint.
#[derive(Clone)]
pub struct OpenIdClient {
    http_client: Client,
    config: OpenIdConfig,
    endpoint: Url,
    nonce_store: Arc<dyn NonceStore>,
}

impl OpenIdClient {
    pub fn new(config: OpenIdConfig, nonce_store: Arc<dyn NonceStore>) -> OpenIdResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            config,
            endpoint,
            nonce_store,
        })
    }

    pub fn config(&self) -> &OpenIdConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[cfg(test)]
    pub fn nonce_store(&self) -> &Arc<dyn NonceStore> {
        &self.nonce_store
    }

    /// Builds the URL that sends the user agent to the provider.
    ///
    /// After authentication the provider redirects back to `return_to`.
    pub fn authentication_url(&self, return_to: &Url) -> Url {
        let mut realm = return_to.clone();
        realm.set_path("/");
        realm.set_query(None);
        realm.set_fragment(None);

        let mut url = self.endpoint.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("openid.ns", OPENID_NS);
            params.append_pair("openid.claimed_id", IDENTIFIER_SELECT);
            params.append_pair("openid.identity", IDENTIFIER_SELECT);
            params.append_pair("openid.return_to", return_to.as_str());
            params.append_pair("openid.realm", realm.as_str());
            params.append_pair("openid.mode", "checkid_setup");

            for (key, value) in ax::fetch_request_params(&self.config.ask_for) {
                params.append_pair(&key, &value);
            }
        }

        debug!(
            "Generated authentication URL for provider {}",
            self.config.provider_id
        );
        url
    }

    /// Verifies a positive assertion delivered to `current_url`.
    pub async fn verify(
        &self,
        current_url: &Url,
        params: &CallbackParams,
    ) -> OpenIdResult<AssertionClaims> {
        match params.get("openid.mode") {
            Some("id_res") => {}
            Some("cancel") => return Err(OpenIdError::Cancelled),
            Some("error") => {
                let message = params.get("openid.error").unwrap_or("unspecified error");
                return Err(OpenIdError::ProviderError(message.to_string()));
            }
            Some(other) => {
                return Err(OpenIdError::InvalidResponse(format!(
                    "unexpected openid.mode '{}'",
                    other
                )));
            }
            None => {
                return Err(OpenIdError::InvalidResponse(
                    "missing openid.mode".to_string(),
                ));
            }
        }

        self.check_endpoint(params)?;
        self.check_return_to(current_url, params)?;

        let signed = SignedFields::from_params(params)?;
        signed.require_mandatory(params)?;

        let nonce = params.get("openid.response_nonce").ok_or_else(|| {
            OpenIdError::InvalidResponse("missing openid.response_nonce".to_string())
        })?;
        let expires_at = self.check_nonce_window(nonce, Utc::now())?;

        self.check_authentication(params).await?;
        self.nonce_store.record(nonce, expires_at).await?;

        let claims = AssertionClaims {
            claimed_id: params
                .get("openid.claimed_id")
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            ax: AxClaims::extract(params, &signed),
        };

        info!(
            "Verified OpenID assertion from provider {}",
            self.config.provider_id
        );
        Ok(claims)
    }

    fn check_endpoint(&self, params: &CallbackParams) -> OpenIdResult<()> {
        let Some(op_endpoint) = params.get("openid.op_endpoint") else {
            return Ok(());
        };

        let matches = Url::parse(op_endpoint)
            .map(|url| url == self.endpoint)
            .unwrap_or(false);
        if !matches {
            warn!("Rejecting assertion from foreign endpoint {}", op_endpoint);
            return Err(OpenIdError::EndpointMismatch {
                expected: self.endpoint.to_string(),
                got: op_endpoint.to_string(),
            });
        }
        Ok(())
    }

    fn check_return_to(&self, current_url: &Url, params: &CallbackParams) -> OpenIdResult<()> {
        let return_to = params
            .get("openid.return_to")
            .ok_or_else(|| OpenIdError::InvalidResponse("missing openid.return_to".to_string()))?;
        let return_to = Url::parse(return_to)?;

        let same_target = return_to.scheme() == current_url.scheme()
            && return_to.host_str() == current_url.host_str()
            && return_to.port_or_known_default() == current_url.port_or_known_default()
            && return_to.path() == current_url.path();
        if !same_target {
            warn!("openid.return_to {} does not match {}", return_to, current_url);
            return Err(OpenIdError::ReturnToMismatch);
        }

        let current: Vec<_> = current_url.query_pairs().collect();
        for pair in return_to.query_pairs() {
            if !current.contains(&pair) {
                warn!("Query parameter '{}' of openid.return_to is missing", pair.0);
                return Err(OpenIdError::ReturnToMismatch);
            }
        }
        Ok(())
    }

    /// Returns how long the nonce must be remembered.
    fn check_nonce_window(&self, nonce: &str, now: DateTime<Utc>) -> OpenIdResult<DateTime<Utc>> {
        let issued_at = nonce_timestamp(nonce)?;
        let max_age = seconds(self.config.nonce_max_age_seconds)?;
        let skew = seconds(self.config.clock_skew_seconds)?;

        let (Some(oldest), Some(newest)) =
            (now.checked_sub_signed(max_age), now.checked_add_signed(skew))
        else {
            return Err(OpenIdError::ConfigError(
                "nonce window is out of range".to_string(),
            ));
        };
        if issued_at < oldest || issued_at > newest {
            warn!("Response nonce issued at {} is outside the window", issued_at);
            return Err(OpenIdError::StaleNonce);
        }

        max_age
            .checked_add(&skew)
            .and_then(|window| issued_at.checked_add_signed(window))
            .ok_or_else(|| OpenIdError::ConfigError("nonce window is out of range".to_string()))
    }

    /// Asks the provider to confirm the assertion.
    async fn check_authentication(&self, params: &CallbackParams) -> OpenIdResult<()> {
        let mut form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(key, _)| key.starts_with("openid.") && *key != "openid.mode")
            .collect();
        form.push(("openid.mode", "check_authentication"));

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("check_authentication request failed: {}", e);
                e
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("Invalid OpenID response ({}): {}", status, body);
            return Err(OpenIdError::VerificationFailed(format!(
                "provider answered {}",
                status
            )));
        }

        let verdict = CheckAuthenticationResponse::parse(&body);
        if !verdict.is_valid {
            warn!("Invalid OpenID response: {}", body);
            return Err(OpenIdError::VerificationFailed(
                "provider did not confirm the assertion".to_string(),
            ));
        }

        Ok(())
    }
}

fn seconds(value: u64) -> OpenIdResult<TimeDelta> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| OpenIdError::ConfigError(format!("{} seconds is out of range", value)))
}
