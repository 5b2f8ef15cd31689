use thiserror::Error;

/// Errors raised by a [`KvBackend`](super::KvBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Interrupted while waiting on the backend")]
    Interrupted,

    #[error("Unable to resolve siblings for key {namespace}/{key}")]
    UnresolvedConflict { namespace: String, key: String },

    #[error("Backend execution failed: {0}")]
    Execution(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
