use thiserror::Error;

use crate::domain::error::DomainError;

/// Failure kinds surfaced by [`BannerService`](super::BannerService).
///
/// Collaborator errors never cross this boundary; they are logged and classified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BannerError {
    #[error("banner conflicts with an existing feature/tag pair")]
    Conflict,
    #[error("banner not found")]
    NotFound,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("internal error")]
    Internal,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<DomainError> for BannerError {
    fn from(err: DomainError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
