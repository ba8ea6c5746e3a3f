use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("banner validation failed: {message}")]
    Validation { message: String },
    #[error("banner update supplies no fields")]
    EmptyUpdate,
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
