//! Error taxonomy for the engine.
//!
//! Every fallible engine operation returns [`EngineError`]. Provider and
//! storage failures propagate unmodified to the caller; the engine never
//! substitutes an empty result for a failure it can distinguish.

use thiserror::Error;

/// Errors raised by the engine's components.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad caller-supplied parameters (chunking windows, empty content).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Document format the extraction step does not recognize.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Transport or auth failure talking to the model backend.
    #[error("model provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The model backend returned a malformed or empty result.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The persistence collaborator failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
