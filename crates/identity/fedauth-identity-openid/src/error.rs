//! OpenID error types.

use fedauth_identity_core::IdentityError;
use thiserror::Error;

pub type OpenIdResult<T> = Result<T, OpenIdError>;

#[derive(Debug, Error)]
pub enum OpenIdError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Authentication cancelled by user")]
    Cancelled,

    #[error("Provider returned an error: {0}")]
    ProviderError(String),

    #[error("Invalid OpenID response: {0}")]
    InvalidResponse(String),

    #[error("Assertion was issued by {got}, expected {expected}")]
    EndpointMismatch { expected: String, got: String },

    #[error("openid.return_to does not match the current request")]
    ReturnToMismatch,

    #[error("Field '{0}' is not covered by the signature")]
    UnsignedField(String),

    #[error("Response nonce is malformed")]
    MalformedNonce,

    #[error("Response nonce is outside the accepted time window")]
    StaleNonce,

    #[error("Response nonce has already been used")]
    NonceReplay,

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Incomplete claims: {0}")]
    IncompleteClaims(String),
}

impl From<OpenIdError> for IdentityError {
    fn from(err: OpenIdError) -> Self {
        match err {
            OpenIdError::Cancelled => IdentityError::Cancelled,
            OpenIdError::IncompleteClaims(msg) => IdentityError::IncompleteClaims(msg),
            OpenIdError::HttpError(e) => IdentityError::ProviderError(e.to_string()),
            OpenIdError::ConfigError(msg) => IdentityError::ProviderError(msg),
            other => IdentityError::AuthenticationFailed(other.to_string()),
        }
    }
}
