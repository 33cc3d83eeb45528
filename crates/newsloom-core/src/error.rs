//! Error types for newsloom.

use thiserror::Error;

/// Result type alias using newsloom's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for newsloom operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Article not found
    #[error("Article not found: {0}")]
    ArticleNotFound(uuid::Uuid),

    /// Story not found
    #[error("Story not found: {0}")]
    StoryNotFound(uuid::Uuid),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Entity extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Whether a failed job carrying this error should be retried.
    ///
    /// Transient transport and upstream failures are retryable; malformed
    /// input and schema-level problems are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Request(_) | Error::Embedding(_) | Error::Extraction(_) | Error::Database(_)
        )
    }
}
