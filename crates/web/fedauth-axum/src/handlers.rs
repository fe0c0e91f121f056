//! Login and logout routes.

use crate::error::{AuthError, AuthResult};
use crate::request::{callback_params, request_url, safe_next, same_origin_referer};
use crate::{GoogleAuth, SESSION_KEY};
use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Redirect, Response};
use fedauth_session::Session;
use tracing::{debug, info};

/// Starts authentication, or completes it when the provider has sent the
/// user back with `openid.mode` set.
pub(crate) async fn login(
    State(auth): State<GoogleAuth>,
    session: Session,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Response> {
    let current_url = request_url(auth.external_base(), &headers, &uri)?;
    let params = callback_params(&method, &headers, &uri, &body);

    if !params.contains("openid.mode") {
        let target = auth.provider().begin(&current_url).await?;
        debug!("Redirecting to identity provider at {}", target.origin().ascii_serialization());
        return Ok(Redirect::to(target.as_str()).into_response());
    }

    let identity = auth.provider().verify(&current_url, &params).await?;

    if let Some(domain) = &auth.config().required_domain {
        if !identity.belongs_to(domain) {
            return Err(AuthError::DomainMismatch {
                expected: domain.clone(),
                got: identity.domain.clone(),
            });
        }
    }

    session.cycle_id().await;
    session.insert(SESSION_KEY, &identity).await?;
    info!("User {} logged in", identity.email);

    let target = safe_next(params.get("next"))
        .or_else(|| same_origin_referer(&headers, &current_url))
        .unwrap_or_else(|| auth.config().default_redirect.clone());
    Ok(Redirect::to(&target).into_response())
}

pub(crate) async fn logout(
    State(auth): State<GoogleAuth>,
    session: Session,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(identity) = session.remove(SESSION_KEY).await {
        let email = identity.get("email").and_then(|v| v.as_str()).unwrap_or("unknown");
        info!("User {} logged out", email);
    }

    let params = callback_params(&method, &headers, &uri, &body);
    let target =
        safe_next(params.get("next")).unwrap_or_else(|| auth.config().default_redirect.clone());
    Redirect::to(&target).into_response()
}
