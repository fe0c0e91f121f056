//! Session storage.

use crate::error::SessionResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_SECONDS: u64 = 10 * 365 * 86_400;

/// Point in time `ttl_seconds` after `from`. The lifetime is capped at
/// [`MAX_SESSION_TTL_SECONDS`].
pub(crate) fn expiry_after(from: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds.min(MAX_SESSION_TTL_SECONDS))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Session data as persisted by a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub data: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(ttl_seconds: u64) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            data: HashMap::new(),
            created_at,
            expires_at: expiry_after(created_at, ttl_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Trait for session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session. Expired sessions are reported as missing.
    async fn load(&self, id: &str) -> SessionResult<Option<SessionRecord>>;

    /// Insert or replace a session
    async fn save(&self, record: SessionRecord) -> SessionResult<()>;

    async fn destroy(&self, id: &str) -> SessionResult<()>;

    /// Clean up expired sessions
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> SessionResult<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn save(&self, record: SessionRecord) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();

        let before = sessions.len();
        sessions.retain(|_, record| now <= record.expires_at);

        Ok(before - sessions.len())
    }
}
