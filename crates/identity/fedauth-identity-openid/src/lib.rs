//! OpenID 2.0 relying party with Google Federated Login support.
//!
//! This crate provides an OpenID client that redirects users to a fixed provider
//! endpoint, requests profile attributes through Attribute Exchange, and confirms
//! returned assertions with a direct `check_authentication` request. It integrates
//! with the fedauth-identity-core traits to provide OpenID-based authentication.
//!
//! Discovery is not supported in order to keep the client simple.

pub mod ax;
mod client;
mod config;
mod error;
mod nonce;
mod provider;
mod types;

#[cfg(test)]
mod tests;

pub use ax::{AxAttribute, AxClaims};
pub use client::OpenIdClient;
pub use config::{GOOGLE_ENDPOINT, MAX_CLOCK_SKEW_SECONDS, MAX_NONCE_AGE_SECONDS, OpenIdConfig};
pub use error::{OpenIdError, OpenIdResult};
pub use nonce::{InMemoryNonceStore, NonceStore, nonce_timestamp};
pub use provider::OpenIdProvider;
pub use types::{
    AssertionClaims, CheckAuthenticationResponse, IDENTIFIER_SELECT, OPENID_NS, SignedFields,
    parse_key_value_form,
};

// Re-export common types for convenience
pub use fedauth_identity_core::{CallbackParams, IdentityProvider, VerifiedIdentity};
