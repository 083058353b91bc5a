use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid repository data: {message}")]
    InvalidData { message: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
