use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Invalid session configuration: {0}")]
    Config(String),
}
