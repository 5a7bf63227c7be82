//! Error types for the metrowatch service

/// Errors that can occur in the metrowatch service
#[derive(Debug, thiserror::Error)]
pub enum MetroWatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// Result type alias for metrowatch operations
pub type Result<T> = std::result::Result<T, MetroWatchError>;
