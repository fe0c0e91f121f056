//! Session middleware: loads the session named by the cookie, saves it afterwards.

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::store::{MAX_SESSION_TTL_SECONDS, SessionStore, expiry_after};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use std::sync::Arc;
use tracing::{debug, error};

/// Cookie and lifetime settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_path: String,
    pub ttl_seconds: u64,
    /// Only send the cookie over HTTPS
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "fedauth_session".to_string(),
            cookie_path: "/".to_string(),
            ttl_seconds: 86400, // 24 hours
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

impl SessionConfig {
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.cookie_name.is_empty() {
            return Err(SessionError::Config("cookie name is empty".to_string()));
        }
        if self.ttl_seconds == 0 || self.ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(SessionError::Config(format!(
                "session TTL must be between 1 and {} seconds, got {}",
                MAX_SESSION_TTL_SECONDS, self.ttl_seconds
            )));
        }
        Ok(())
    }
}

/// Owns the store and the key that encrypts the session cookie.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    key: Key,
    config: Arc<SessionConfig>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        key: Key,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            key,
            config: Arc::new(config),
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn load(&self, jar: &PrivateCookieJar) -> SessionResult<Session> {
        let Some(cookie) = jar.get(&self.config.cookie_name) else {
            return Ok(Session::fresh(self.config.ttl_seconds));
        };

        match self.store.load(cookie.value()).await? {
            Some(record) => Ok(Session::existing(record)),
            None => {
                debug!("Session cookie refers to an unknown or expired session");
                Ok(Session::fresh(self.config.ttl_seconds))
            }
        }
    }

    /// Writes changes back to the store and returns the cookie delta.
    async fn persist(&self, session: &Session, jar: PrivateCookieJar) -> SessionResult<PrivateCookieJar> {
        let mut inner = session.shared().lock().await;

        if let Some(retired_id) = inner.retired_id.take() {
            self.store.destroy(&retired_id).await?;
        }

        if !inner.modified {
            return Ok(jar);
        }

        if inner.record.data.is_empty() {
            if inner.persisted {
                self.store.destroy(&inner.record.id).await?;
                inner.persisted = false;
            }
            inner.modified = false;
            return Ok(jar.remove(
                Cookie::build(self.config.cookie_name.clone()).path(self.config.cookie_path.clone()),
            ));
        }

        inner.record.expires_at = expiry_after(chrono::Utc::now(), self.config.ttl_seconds);
        self.store.save(inner.record.clone()).await?;
        inner.persisted = true;
        inner.modified = false;

        let cookie = Cookie::build((self.config.cookie_name.clone(), inner.record.id.clone()))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .secure(self.config.secure)
            .same_site(self.config.same_site);
        Ok(jar.add(cookie))
    }
}

/// Middleware that makes a [`Session`] available to every handler.
///
/// Install with `axum::middleware::from_fn_with_state(manager, session_middleware)`.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = PrivateCookieJar::from_headers(request.headers(), manager.key.clone());

    let session = match manager.load(&jar).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to load session: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response();
        }
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    match manager.persist(&session, jar).await {
        Ok(jar) => (jar, response).into_response(),
        Err(e) => {
            error!("Failed to save session: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
        }
    }
}
