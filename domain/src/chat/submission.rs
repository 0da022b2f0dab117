//! Validation of a submitted chat form

use super::entities::ChatId;
use crate::core::error::DomainError;

/// A validated chat form submission (`chatId` + `text`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub chat_id: ChatId,
    pub text: String,
}

impl Submission {
    /// Validate the raw form fields.
    ///
    /// `text` is kept verbatim (no trimming) but must not be empty.
    pub fn parse(chat_id: &str, text: &str) -> Result<Self, DomainError> {
        let chat_id: ChatId = chat_id.parse()?;
        if text.is_empty() {
            return Err(DomainError::EmptyText);
        }
        Ok(Self {
            chat_id,
            text: text.to_string(),
        })
    }
}
