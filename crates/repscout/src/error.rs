//! Error types.
//!
//! Only [`ScoutError`] ever reaches a caller of the batch run, and only
//! before any item has been processed. Per-item failures are folded into
//! [`crate::orchestrator::ItemOutcome`] instead.

use std::time::Duration;

/// Run-level errors: unreachable sources, bad configuration, storage I/O.
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    #[error("Worklist source unavailable: {0}")]
    WorklistUnavailable(String),

    #[error("Egress source unavailable: {0}")]
    EgressUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type ScoutResult<T> = Result<T, ScoutError>;

/// A fetch that never produced a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

/// The generative-model endpoint could not produce a usable answer.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("model endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("model endpoint returned status {0}")]
    Status(u16),

    #[error("model returned no usable payload")]
    InvalidPayload,
}
