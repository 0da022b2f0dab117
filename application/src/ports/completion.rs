//! Completion provider port
//!
//! Defines the interface for streaming text out of a language model.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use streamchat_domain::Author;
use thiserror::Error;

/// Errors that can occur while starting or reading a completion
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Missing API key (set {0})")]
    MissingApiKey(String),
}

/// Role of a prompt turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Author> for PromptRole {
    fn from(author: Author) -> Self {
        match author {
            Author::Me => PromptRole::User,
            Author::Bot => PromptRole::Assistant,
        }
    }
}

/// One turn of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Streamed model output.
///
/// Each item is an incremental text fragment, or `None` for a chunk that
/// carried no text (e.g. a role-only delta). Stream end is the terminal
/// signal; an `Err` item ends the completion with a failure.
pub type TokenStream = BoxStream<'static, Result<Option<String>, ProviderError>>;

/// Source of streamed model completions
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a completion. Errors here mean the call never started.
    async fn stream_completion(&self, prompt: Vec<PromptMessage>)
    -> Result<TokenStream, ProviderError>;
}
