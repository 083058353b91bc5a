use thiserror::Error;

use crate::repositories::RepositoryError;

/// Failure modes of a send or regeneration.
///
/// None of these trigger an automatic retry; retrying is a caller decision.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network or HTTP-level failure reaching the generation backend.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The transport succeeded but the payload could not be understood.
    #[error("malformed generation payload: {0}")]
    Protocol(String),

    /// The backend reported an error inside an otherwise well-formed,
    /// transport-successful chunk.
    #[error("generation failed upstream: {0}")]
    InBand(String),

    /// Caller-initiated abort. Expected during normal operation; callers
    /// are expected not to surface this as an error.
    #[error("generation cancelled")]
    Cancelled,

    /// A persistence call failed. When this happens after generation the
    /// reply text is kept visible but must never be presented as saved.
    #[error("persistence call failed: {0}")]
    Persistence(#[from] RepositoryError),

    /// A second send was attempted while one is outstanding. The
    /// orchestrator never queues.
    #[error("a send is already in progress for this conversation")]
    Busy,

    /// The targeted message cannot be regenerated (wrong entry kind, or its
    /// originating user message was deleted).
    #[error("message is not eligible for regeneration: {0}")]
    InvalidTarget(String),
}

pub type SendResult<T> = Result<T, SendError>;
