use thiserror::Error;

/// Everything that can go wrong in the support chat client.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("gateway connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway handshake failed: {0}")]
    Handshake(String),

    #[error("gateway confirmed user {actual}, expected {expected}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("connection is closed")]
    Closed,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
