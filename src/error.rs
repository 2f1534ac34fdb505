use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhishError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: at most {limit} reports per {window_secs}s")]
    RateLimited { limit: u64, window_secs: u64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single evidence pin attempt.
#[derive(Error, Debug)]
pub enum PinError {
    #[error("Pinning not configured: {0}")]
    Configuration(String),

    #[error("Pinning upstream failed: {0}")]
    Upstream(String),

    #[error("Invalid response from pinning service: {0}")]
    Protocol(String),
}

impl From<rusqlite::Error> for PhishError {
    fn from(e: rusqlite::Error) -> Self {
        PhishError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PhishError>;
