use thiserror::Error;

/// Errors surfaced by a [`crate::ResponseStore`] or [`crate::FileStore`] implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// No record exists for the given id.
    #[error("no stored response with id '{0}'")]
    NotFound(String),
    /// A `put` was attempted for an id that already exists with different content.
    #[error("stored response '{0}' already exists with different content")]
    Conflict(String),
    /// The storage backend itself failed (I/O, serialization, connection).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type returned by store operations.
pub type Result<T> = std::result::Result<T, Error>;
