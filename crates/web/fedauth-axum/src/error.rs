//! Extension errors and their HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fedauth_identity_core::IdentityError;
use fedauth_session::SessionError;
use thiserror::Error;
use tracing::{error, warn};

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    Authentication(#[from] IdentityError),

    #[error("Account domain '{got}' is not '{expected}'")]
    DomainMismatch { expected: String, got: String },

    #[error("Cannot determine request URL: {0}")]
    RequestUrl(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Session layer is not installed")]
    SessionLayerMissing,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::Authentication(_) | AuthError::DomainMismatch { .. } => {
                warn!("Access denied: {}", self);
                (StatusCode::FORBIDDEN, "Access denied")
            }
            AuthError::RequestUrl(_) => {
                warn!("{}", self);
                (StatusCode::BAD_REQUEST, "Bad request")
            }
            AuthError::Session(_) | AuthError::SessionLayerMissing | AuthError::Config(_) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let denied = AuthError::DomainMismatch {
            expected: "mokote.com".to_string(),
            got: "example.com".to_string(),
        };
        assert_eq!(denied.into_response().status(), StatusCode::FORBIDDEN);

        let failed = AuthError::from(IdentityError::Cancelled);
        assert_eq!(failed.into_response().status(), StatusCode::FORBIDDEN);

        let missing = AuthError::SessionLayerMissing;
        assert_eq!(
            missing.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
