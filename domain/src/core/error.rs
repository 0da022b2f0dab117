//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Every variant is a validation failure: the domain layer performs no I/O,
/// so nothing here is retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid chat id: {0:?}")]
    InvalidChatId(String),

    #[error("Message text is empty")]
    EmptyText,

    #[error("Invalid author: {0}")]
    InvalidAuthor(String),
}

impl DomainError {
    /// Check if this error was caused by user input (as opposed to stored data)
    pub fn is_user_input(&self) -> bool {
        matches!(self, DomainError::InvalidChatId(_) | DomainError::EmptyText)
    }
}
