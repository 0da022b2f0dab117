//! Message store port
//!
//! Defines how use cases read and write chat messages.

use async_trait::async_trait;
use streamchat_domain::{ChatId, Message, NewMessage};
use thiserror::Error;

/// Errors that can occur during message store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

/// Persistent message storage
///
/// Every `insert` must be a single atomic write: concurrent submissions rely
/// on statement atomicity rather than on locking in the caller.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Write a message and return it with its assigned id
    async fn insert(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// All messages of a chat, oldest first
    async fn list(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError>;
}
