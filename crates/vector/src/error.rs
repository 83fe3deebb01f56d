use thiserror::Error;

/// Errors raised by the vector search tool.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file '{0}' is not indexed")]
    NotFound(String),
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("failed to persist vector index: {0}")]
    Persistence(String),
}

/// Result type returned by vector index operations.
pub type Result<T> = std::result::Result<T, Error>;
