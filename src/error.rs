use thiserror::Error;

use crate::kv::BackendError;

/// Failure of a store operation. Not-found is never an error: stores return
/// `Ok(None)` for keys that don't exist.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Stored value for {key} could not be decoded: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Notification {id} was not admitted to the feed of {key}")]
    Rejected { key: String, id: i64 },

    #[error("Identity generation failed: {0}")]
    IdGeneration(#[from] crate::notifications::IdGeneratorError),

    #[error("Store operation was interrupted")]
    Interrupted,
}
