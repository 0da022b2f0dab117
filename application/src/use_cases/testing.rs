//! In-memory port implementations shared by use case tests

use crate::ports::chat_view::ChatView;
use crate::ports::completion::{CompletionProvider, PromptMessage, ProviderError, TokenStream};
use crate::ports::message_store::{MessageStore, StoreError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use streamchat_domain::{Author, ChatId, Message, NewMessage, RenderNode};

#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
    fail_for: Option<Author>,
}

impl MemoryStore {
    /// A store whose inserts fail for messages by `author`
    pub fn failing_for(author: Author) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_for: Some(author),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: NewMessage) -> Result<Message, StoreError> {
        if self.fail_for == Some(message.author) {
            return Err(StoreError::Storage("disk full".to_string()));
        }
        let mut messages = self.messages.lock().unwrap();
        let stored = Message {
            id: messages.len() as i64 + 1,
            chat_id: message.chat_id,
            author: message.author,
            text: message.text,
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect())
    }
}

pub struct ScriptedProvider {
    script: Mutex<Option<Result<Vec<Result<Option<String>, ProviderError>>, ProviderError>>>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn tokens(tokens: Vec<Result<Option<String>, ProviderError>>) -> Self {
        Self::with_script(Ok(tokens))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::with_script(Err(error))
    }

    fn with_script(
        script: Result<Vec<Result<Option<String>, ProviderError>>, ProviderError>,
    ) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream_completion(
        &self,
        prompt: Vec<PromptMessage>,
    ) -> Result<TokenStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt);
        let script = self.script.lock().unwrap().take().unwrap_or(Ok(Vec::new()));
        script.map(|tokens| stream::iter(tokens).boxed())
    }
}

/// Compact markup that keeps assertions readable
pub struct TestView;

impl ChatView for TestView {
    fn message(&self, author: Author, body: RenderNode) -> RenderNode {
        RenderNode::wrap(format!("<msg {author}>"), body, "</msg>")
    }

    fn pending_message(&self, author: Author) -> String {
        format!("<msg {author}>...</msg>")
    }

    fn typing_indicator(&self) -> String {
        "...".to_string()
    }

    fn error(&self, text: &str) -> String {
        format!("<err>{text}</err>")
    }
}
