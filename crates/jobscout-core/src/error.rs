use thiserror::Error;

/// Keywords that mark an otherwise-unclassified error as a transport hiccup.
const TRANSIENT_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "reset",
    "broken pipe",
];

/// Application-wide error types for jobscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request to the scraping service failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded on the remote side.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The remote tool ran and reported a failure.
    #[error("Tool error: {0}")]
    ToolError(String),

    /// The remote answered with something that is not a valid protocol message.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Transient failures persisted through every retry.
    #[error("Remote service unavailable after {attempts} attempts. Last error: {last_error}")]
    RemoteUnavailable { attempts: u32, last_error: String },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Network failures, timeouts and rate limits always are. Other remote
    /// errors are retried only when their message names a transport problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::RemoteUnavailable { .. }
            | AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::SerializationError(_) => false,
            AppError::HttpError(msg)
            | AppError::ToolError(msg)
            | AppError::ProtocolError(msg)
            | AppError::Generic(msg) => mentions_transport(msg),
        }
    }
}

fn mentions_transport(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
