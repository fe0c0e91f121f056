//! Google OpenID and Federated Login for axum.
//!
//! [`GoogleAuth`] provides login and logout routes through [`GoogleAuth::router`],
//! an identity binder ([`bind_identity`]) that exposes the logged-in user as a
//! [`CurrentUser`], and an access guard ([`required`]) for protected routes.
//! Sessions come from `fedauth-session`.
//!
//! ```ignore
//! let auth = GoogleAuth::federated("mokote.com", AuthConfig::default())?;
//!
//! let app = Router::new()
//!     .route("/", get(index))
//!     .route_layer(middleware::from_fn_with_state(auth.clone(), required))
//!     .merge(auth.router())
//!     .layer(middleware::from_fn(bind_identity))
//!     .layer(middleware::from_fn_with_state(sessions, session_middleware));
//! ```

mod config;
mod error;
mod guard;
mod handlers;
mod request;


use axum::Router;
use axum::routing::get;
use fedauth_identity_core::IdentityProvider;
use fedauth_identity_openid::{InMemoryNonceStore, NonceStore, OpenIdConfig, OpenIdProvider};
use std::sync::Arc;
use url::Url;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guard::{CurrentUser, bind_identity, required};

pub use fedauth_identity_core::VerifiedIdentity;

/// Session key under which the logged-in identity is stored
pub const SESSION_KEY: &str = "openid";

/// The authentication extension. Cheap to clone.
#[derive(Clone)]
pub struct GoogleAuth {
    inner: Arc<GoogleAuthInner>,
}

struct GoogleAuthInner {
    config: AuthConfig,
    external_base: Option<Url>,
    provider: Arc<dyn IdentityProvider>,
}

impl GoogleAuth {
    pub fn new(config: AuthConfig, provider: Arc<dyn IdentityProvider>) -> AuthResult<Self> {
        config.validate()?;
        let external_base = config.external_base()?;
        Ok(Self {
            inner: Arc::new(GoogleAuthInner {
                config,
                external_base,
                provider,
            }),
        })
    }

    /// Authenticates any Google account.
    pub fn google(config: AuthConfig) -> AuthResult<Self> {
        Self::openid(OpenIdConfig::google(), Arc::new(InMemoryNonceStore::new()), config)
    }

    /// Authenticates accounts of a Google Apps domain through Federated Login
    /// and only lets that domain in.
    pub fn federated(domain: &str, config: AuthConfig) -> AuthResult<Self> {
        Self::openid(
            OpenIdConfig::google_apps(domain),
            Arc::new(InMemoryNonceStore::new()),
            config.with_required_domain(domain),
        )
    }

    pub fn openid(
        openid: OpenIdConfig,
        nonce_store: Arc<dyn NonceStore>,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let provider = OpenIdProvider::new(openid, nonce_store)
            .map_err(|e| AuthError::Config(e.to_string()))?;
        Self::new(config, Arc::new(provider))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.provider
    }

    pub(crate) fn external_base(&self) -> Option<&Url> {
        self.inner.external_base.as_ref()
    }

    /// Login and logout routes, both answering GET and POST.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new()
            .route(
                &self.config().login_route(),
                get(handlers::login).post(handlers::login),
            )
            .route(
                &self.config().logout_route(),
                get(handlers::logout).post(handlers::logout),
            )
            .with_state(self.clone())
    }
}
