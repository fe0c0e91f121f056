//! Server-side sessions keyed by an encrypted cookie.
//!
//! Handlers extract a [`Session`] and read or write JSON values by key. The
//! [`session_middleware`] loads the session before the handler runs and writes
//! it back, together with the `Set-Cookie` header, afterwards. Storage is
//! pluggable through [`SessionStore`].

mod error;
mod layer;
mod session;
mod store;

pub use error::{SessionError, SessionResult};
pub use layer::{SessionConfig, SessionManager, session_middleware};
pub use session::Session;
pub use store::{InMemorySessionStore, MAX_SESSION_TTL_SECONDS, SessionRecord, SessionStore};

pub use axum_extra::extract::cookie::{Key, SameSite};
