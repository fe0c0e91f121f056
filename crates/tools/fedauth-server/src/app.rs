//! Router and shared stores of the demo server.

use crate::config::Config;
use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use fedauth_axum::{AuthConfig, CurrentUser, GoogleAuth, bind_identity, required};
use fedauth_identity_openid::{InMemoryNonceStore, NonceStore, OpenIdConfig};
use fedauth_session::{
    InMemorySessionStore, Key, SessionConfig, SessionManager, SessionStore, session_middleware,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

pub struct App {
    pub router: Router,
    pub sessions: Arc<dyn SessionStore>,
    pub nonces: Arc<dyn NonceStore>,
}

pub fn build(config: &Config) -> Result<App> {
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let nonces: Arc<dyn NonceStore> = Arc::new(InMemoryNonceStore::new());

    let auth = GoogleAuth::openid(openid_config(config)?, nonces.clone(), auth_config(config))
        .context("Failed to set up authentication")?;

    let session_manager = SessionManager::new(
        sessions.clone(),
        cookie_key(&config.auth.cookie_secret)?,
        SessionConfig::default()
            .with_ttl(config.auth.session_ttl_seconds)
            .with_secure(config.auth.secure_cookies),
    )
    .context("Invalid session settings")?;

    let router = Router::new()
        .route("/", get(index))
        .route_layer(from_fn_with_state(auth.clone(), required))
        .route("/whoami", get(whoami))
        .route("/health", get(|| async { "OK" }))
        .merge(auth.router())
        .layer(from_fn(bind_identity))
        .layer(from_fn_with_state(session_manager, session_middleware))
        .layer(TraceLayer::new_for_http());

    Ok(App {
        router,
        sessions,
        nonces,
    })
}

fn openid_config(config: &Config) -> Result<OpenIdConfig> {
    let mut openid = match &config.auth.domain {
        Some(domain) => OpenIdConfig::google_apps(domain),
        None => OpenIdConfig::google(),
    };
    if let Some(endpoint) = &config.openid.endpoint {
        debug!("Using OpenID endpoint override {}", endpoint);
        openid = openid.with_endpoint(endpoint.clone());
    }

    Ok(openid
        .with_ask_for(config.openid.attributes()?)
        .with_http_timeout(config.openid.http_timeout_seconds)
        .with_nonce_max_age(config.openid.nonce_max_age_seconds))
}

fn auth_config(config: &Config) -> AuthConfig {
    let mut auth = AuthConfig::new().with_url_prefix(config.auth.url_prefix.clone());
    if let Some(domain) = &config.auth.domain {
        auth = auth.with_required_domain(domain.clone());
    }
    if let Some(url) = &config.auth.external_url {
        auth = auth.with_external_url(url.clone());
    }
    auth
}

fn cookie_key(secret: &str) -> Result<Key> {
    if secret.is_empty() {
        warn!("No cookie secret configured, sessions will not survive a restart");
        return Ok(Key::generate());
    }
    Key::try_from(secret.as_bytes()).context("Invalid cookie secret")
}

async fn index(user: CurrentUser) -> String {
    let name = user
        .identity()
        .map(|identity| identity.name.clone().unwrap_or_else(|| identity.email.clone()))
        .unwrap_or_default();
    format!("Hello, {}!", name)
}

async fn whoami(user: CurrentUser) -> Json<Value> {
    Json(json!({
        "authenticated": user.is_authenticated(),
        "identity": user.identity(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::header::{HOST, LOCATION};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    fn request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(HOST, "localhost:3000")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build(&Config::default()).unwrap();
        let response = app.router.oneshot(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_whoami_anonymous() {
        let app = build(&Config::default()).unwrap();
        let response = app.router.oneshot(request("/whoami")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["authenticated"], false);
        assert!(value["identity"].is_null());
    }

    #[tokio::test]
    async fn test_index_requires_login() {
        let mut config = Config::default();
        config.auth.domain = Some("mokote.com".to_string());
        config.auth.url_prefix = "/auth".to_string();
        let app = build(&config).unwrap();

        let response = app.router.clone().oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/auth/login/?next=%2F"
        );

        let response = app
            .router
            .oneshot(request("/auth/login/?next=%2F"))
            .await
            .unwrap();
        let provider = response.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(provider.starts_with("https://www.google.com/a/mokote.com/o8/ud?be=o8&"));
    }

    #[test]
    fn test_cookie_key() {
        assert!(cookie_key("").is_ok());
        assert!(cookie_key(&"s".repeat(64)).is_ok());
        assert!(cookie_key("short").is_err());
    }
}
