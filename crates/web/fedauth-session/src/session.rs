//! Per-request session handle.

use crate::error::SessionResult;
use crate::store::SessionRecord;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) record: SessionRecord,
    /// The record exists in the store under `record.id`
    pub(crate) persisted: bool,
    pub(crate) modified: bool,
    /// Id that must be destroyed after `cycle_id`
    pub(crate) retired_id: Option<String>,
}

/// Key-value session attached to the current request.
///
/// Cloning is cheap; all clones share the same data. Changes are written
/// back to the store once the handler has produced its response.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub(crate) fn fresh(ttl_seconds: u64) -> Self {
        Self::from_inner(SessionInner {
            record: SessionRecord::new(ttl_seconds),
            persisted: false,
            modified: false,
            retired_id: None,
        })
    }

    pub(crate) fn existing(record: SessionRecord) -> Self {
        Self::from_inner(SessionInner {
            record,
            persisted: true,
            modified: false,
            retired_id: None,
        })
    }

    fn from_inner(inner: SessionInner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Mutex<SessionInner>> {
        &self.inner
    }

    pub async fn id(&self) -> String {
        self.inner.lock().await.record.id.clone()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.record.data.contains_key(key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
        let inner = self.inner.lock().await;
        match inner.record.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock().await;
        inner.record.data.insert(key.to_string(), value);
        inner.modified = true;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock().await;
        let removed = inner.record.data.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.record.data.is_empty() {
            inner.record.data.clear();
            inner.modified = true;
        }
    }

    /// Moves the data to a new session id, e.g. after a privilege change.
    pub async fn cycle_id(&self) {
        let mut inner = self.inner.lock().await;
        let new_id = Uuid::new_v4().to_string();
        let old_id = std::mem::replace(&mut inner.record.id, new_id);
        if inner.persisted {
            inner.retired_id = Some(old_id);
            inner.persisted = false;
        }
        inner.modified = true;
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session layer is not installed",
        ))
    }
}
