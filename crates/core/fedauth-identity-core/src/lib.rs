//! Core identity provider traits and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authentication cancelled by user")]
    Cancelled,

    #[error("Incomplete claims: {0}")]
    IncompleteClaims(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid authentication payload")]
    InvalidPayload,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// An identity asserted by a provider and confirmed by the relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub provider_id: String,
    /// Claimed identifier returned by the provider.
    pub subject: String,
    pub name: Option<String>,
    pub email: String,
    /// Lowercased domain part of `email`.
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl VerifiedIdentity {
    /// Whether this identity belongs to `domain`, compared ASCII case-insensitively.
    pub fn belongs_to(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain.trim())
    }
}

/// Extracts the lowercased domain from an email address.
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

/// Query or form parameters received on the provider callback.
///
/// When a key repeats, the first value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    params: HashMap<String, String>,
}

impl CallbackParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CallbackParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CallbackParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A redirect-based identity provider.
///
/// `begin` produces the URL the user agent is sent to; `verify` checks what
/// the provider sends back to `return_to`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn begin(&self, return_to: &Url) -> IdentityResult<Url>;

    async fn verify(
        &self,
        current_url: &Url,
        params: &CallbackParams,
    ) -> IdentityResult<VerifiedIdentity>;
}
