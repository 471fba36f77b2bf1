//! Store error types.

use thiserror::Error;

/// Storage backend failure. Propagated to the caller: a silently dropped
/// write could lose the device identity, so there is no fallback path here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable backend IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("durable snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Store result type.
pub type Result<T> = std::result::Result<T, StoreError>;
