//! Chat domain entities

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest integer a browser can round-trip through a form field without
/// losing precision (`Number.MAX_SAFE_INTEGER`).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Identifier of a chat (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    /// The chat rendered by `GET /`
    pub const DEFAULT: ChatId = ChatId(1);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value) {
            return Err(DomainError::InvalidChatId(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = DomainError;

    /// Parse a decimal integer, optionally signed and surrounded by whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('+'))
            .unwrap_or(trimmed);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidChatId(s.to_string()));
        }

        let value: i64 = trimmed
            .parse()
            .map_err(|_| DomainError::InvalidChatId(s.to_string()))?;
        ChatId::new(value).map_err(|_| DomainError::InvalidChatId(s.to_string()))
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Author {
    Me,
    Bot,
}

impl Author {
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::Me => "Me",
            Author::Bot => "Bot",
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Author {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Me" => Ok(Author::Me),
            "Bot" => Ok(Author::Bot),
            other => Err(DomainError::InvalidAuthor(other.to_string())),
        }
    }
}

/// A stored chat message (Entity)
///
/// Messages are never mutated after they are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: ChatId,
    pub author: Author,
    pub text: String,
}

/// A message that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub author: Author,
    pub text: String,
}

impl NewMessage {
    pub fn from_me(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            author: Author::Me,
            text: text.into(),
        }
    }

    pub fn from_bot(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            author: Author::Bot,
            text: text.into(),
        }
    }
}
