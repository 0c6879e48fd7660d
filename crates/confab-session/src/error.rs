//! Store-specific error types.

use thiserror::Error;

/// Errors that can occur while reading or writing the persisted transcript.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
