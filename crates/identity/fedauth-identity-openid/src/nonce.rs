//! Response nonce bookkeeping for replay protection.

use crate::error::{OpenIdError, OpenIdResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Reads the UTC timestamp that prefixes every `openid.response_nonce`.
pub fn nonce_timestamp(nonce: &str) -> OpenIdResult<DateTime<Utc>> {
    let stamp = nonce.get(..20).ok_or(OpenIdError::MalformedNonce)?;
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%SZ")
        .map(|naive| naive.and_utc())
        .map_err(|_| OpenIdError::MalformedNonce)
}

/// Trait for nonce storage
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Record a nonce as used until `expires_at`. Fails with
    /// `NonceReplay` if it was already recorded.
    async fn record(&self, nonce: &str, expires_at: DateTime<Utc>) -> OpenIdResult<()>;

    /// Clean up expired nonces
    async fn cleanup_expired(&self) -> OpenIdResult<usize>;
}

/// In-memory implementation of NonceStore
pub struct InMemoryNonceStore {
    nonces: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self {
            nonces: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn record(&self, nonce: &str, expires_at: DateTime<Utc>) -> OpenIdResult<()> {
        let mut nonces = self.nonces.write().await;

        if let Some(existing) = nonces.get(nonce) {
            if Utc::now() <= *existing {
                return Err(OpenIdError::NonceReplay);
            }
        }

        nonces.insert(nonce.to_string(), expires_at);
        Ok(())
    }

    async fn cleanup_expired(&self) -> OpenIdResult<usize> {
        let mut nonces = self.nonces.write().await;
        let now = Utc::now();

        let before = nonces.len();
        nonces.retain(|_, expires_at| now <= *expires_at);

        Ok(before - nonces.len())
    }
}
