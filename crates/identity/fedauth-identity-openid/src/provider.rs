//! OpenID identity provider implementation.

use crate::client::OpenIdClient;
use crate::config::OpenIdConfig;
use crate::error::{OpenIdError, OpenIdResult};
use crate::nonce::NonceStore;
use crate::types::AssertionClaims;
use async_trait::async_trait;
use fedauth_identity_core::{
    CallbackParams, IdentityProvider, IdentityResult, VerifiedIdentity, email_domain,
};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// OpenID provider that implements IdentityProvider
#[derive(Clone)]
pub struct OpenIdProvider {
    client: OpenIdClient,
}

impl OpenIdProvider {
    pub fn new(config: OpenIdConfig, nonce_store: Arc<dyn NonceStore>) -> OpenIdResult<Self> {
        Ok(Self {
            client: OpenIdClient::new(config, nonce_store)?,
        })
    }

    pub fn client(&self) -> &OpenIdClient {
        &self.client
    }

    /// Map assertion claims to VerifiedIdentity
    fn map_claims_to_identity(&self, claims: AssertionClaims) -> OpenIdResult<VerifiedIdentity> {
        let ax = claims.ax;

        let email = ax.email.ok_or_else(|| {
            OpenIdError::IncompleteClaims("provider did not return an email address".to_string())
        })?;
        let domain = email_domain(&email).ok_or_else(|| {
            OpenIdError::IncompleteClaims(format!("'{}' is not an email address", email))
        })?;

        let name_parts: Vec<&str> = [ax.first_name.as_deref(), ax.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let name = match ax.full_name {
            Some(full_name) => Some(full_name),
            None if !name_parts.is_empty() => Some(name_parts.join(" ")),
            None => email.split('@').next().map(str::to_string),
        };

        Ok(VerifiedIdentity {
            provider_id: format!("openid:{}", self.client.config().provider_id),
            subject: claims.claimed_id.unwrap_or_else(|| email.clone()),
            name,
            email,
            domain,
            first_name: ax.first_name,
            last_name: ax.last_name,
            locale: ax.language,
            username: ax.username,
        })
    }
}

#[async_trait]
impl IdentityProvider for OpenIdProvider {
    fn provider_id(&self) -> &str {
        &self.client.config().provider_id
    }

    async fn begin(&self, return_to: &Url) -> IdentityResult<Url> {
        Ok(self.client.authentication_url(return_to))
    }

    async fn verify(
        &self,
        current_url: &Url,
        params: &CallbackParams,
    ) -> IdentityResult<VerifiedIdentity> {
        let claims = self.client.verify(current_url, params).await.map_err(|e| {
            warn!("OpenID verification failed: {}", e);
            e
        })?;

        let identity = self.map_claims_to_identity(claims)?;
        info!(
            "Successfully verified identity {} for provider: {}",
            identity.email,
            self.provider_id()
        );
        Ok(identity)
    }
}
