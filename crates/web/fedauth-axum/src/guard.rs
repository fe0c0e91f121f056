//! Identity binder, access guard and the `CurrentUser` extractor.

use crate::error::AuthError;
use crate::request::login_redirect;
use crate::{GoogleAuth, SESSION_KEY};
use axum::extract::{FromRequestParts, OriginalUri, Request, State};
use axum::http::Extensions;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use fedauth_identity_core::VerifiedIdentity;
use fedauth_session::Session;
use tracing::{debug, warn};

/// Identity bound to the current request, `None` when nobody is logged in.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<VerifiedIdentity>);

impl CurrentUser {
    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        self.0.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions).await
    }
}

/// Reads the identity stored at login. A value that no longer deserializes
/// is dropped from the session.
async fn load_identity(session: &Session) -> Option<VerifiedIdentity> {
    match session.get::<VerifiedIdentity>(SESSION_KEY).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Discarding unreadable identity in session: {}", e);
            session.remove(SESSION_KEY).await;
            None
        }
    }
}

async fn current_user(extensions: &Extensions) -> Result<CurrentUser, AuthError> {
    if let Some(user) = extensions.get::<CurrentUser>() {
        return Ok(user.clone());
    }
    let session = extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthError::SessionLayerMissing)?;
    Ok(CurrentUser(load_identity(&session).await))
}

/// Middleware that attaches a [`CurrentUser`] to every request.
///
/// Must run inside the session middleware:
///
/// ```ignore
/// Router::new()
///     .layer(middleware::from_fn(bind_identity))
///     .layer(middleware::from_fn_with_state(sessions, session_middleware))
/// ```
pub async fn bind_identity(mut request: Request, next: Next) -> Response {
    let user = match current_user(request.extensions()).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Middleware that only lets logged-in users of the required domain through.
///
/// Anonymous users are sent to the login route with `next` pointing back at
/// the requested page. Install as a route layer:
///
/// ```ignore
/// .route_layer(middleware::from_fn_with_state(auth.clone(), required))
/// ```
pub async fn required(State(auth): State<GoogleAuth>, mut request: Request, next: Next) -> Response {
    let user = match current_user(request.extensions()).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let Some(identity) = user.0 else {
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| request.uri().clone());
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        debug!("Anonymous request for {}, redirecting to login", target);
        return Redirect::to(&login_redirect(&auth.config().login_route(), target)).into_response();
    };

    if let Some(domain) = &auth.config().required_domain {
        if !identity.belongs_to(domain) {
            return AuthError::DomainMismatch {
                expected: domain.clone(),
                got: identity.domain.clone(),
            }
            .into_response();
        }
    }

    request.extensions_mut().insert(CurrentUser(Some(identity)));
    next.run(request).await
}
