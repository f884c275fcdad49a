use thiserror::Error;

/// Session-level error taxonomy.
///
/// Leaf components surface these unchanged; the orchestrator records them and
/// maps them to a single-line user status. `Decode` is the only class that is
/// recovered without failing the session (Passthrough fallback).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Not a recognized video page")]
    InvalidContext,

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Transport(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No audio streams available (content may be rights-restricted)")]
    NoStreamsAvailable,

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Save failed: {0}")]
    Save(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Download cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AppError>;
