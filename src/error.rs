//! Error taxonomy.
//!
//! Malformed records and lookup misses never produce errors: they degrade to
//! defaults inside the pipeline. The types here cover the edges that are
//! surfaced to the caller: upstream fetches, the lock action and table loading.

use thiserror::Error;

/// Failure of one upstream collaborator fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("unexpected envelope: {0}")]
    Envelope(String),

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure of a lock/unlock request.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("lock request rejected: {0}")]
    Rejected(String),

    #[error("lock request failed: {0}")]
    Transport(String),

    #[error("no device with serial {0}")]
    UnknownDevice(String),
}

/// Failure loading a pincode table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid pincode table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pincode key {0:?}, expected 6 digits")]
    InvalidPincode(String),

    #[error("failed to read pincode table: {0}")]
    Io(#[from] std::io::Error),
}
