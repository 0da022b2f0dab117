//! Load History use case.

use crate::ports::message_store::{MessageStore, StoreError};
use std::sync::Arc;
use streamchat_domain::{ChatId, Message};
use tracing::debug;

/// Reads the stored messages of a chat
#[derive(Clone)]
pub struct LoadHistoryUseCase {
    store: Arc<dyn MessageStore>,
}

impl LoadHistoryUseCase {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Messages of `chat_id`, ordered by id
    pub async fn load(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.store.list(chat_id).await?;
        messages.sort_by_key(|m| m.id);
        debug!(chat = %chat_id, count = messages.len(), "Loaded history");
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::testing::MemoryStore;
    use streamchat_domain::NewMessage;

    #[tokio::test]
    async fn test_load_filters_by_chat() {
        let store = Arc::new(MemoryStore::default());
        let other = ChatId::new(2).unwrap();
        store.insert(NewMessage::from_me(ChatId::DEFAULT, "a")).await.unwrap();
        store.insert(NewMessage::from_me(other, "b")).await.unwrap();
        store.insert(NewMessage::from_bot(ChatId::DEFAULT, "c")).await.unwrap();

        let history = LoadHistoryUseCase::new(store).load(ChatId::DEFAULT).await.unwrap();

        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_chat() {
        let store = Arc::new(MemoryStore::default());
        let history = LoadHistoryUseCase::new(store).load(ChatId::DEFAULT).await.unwrap();
        assert!(history.is_empty());
    }
}
