//! Application layer for streamchat
//!
//! This crate contains the stream renderer, use cases, port definitions, and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod prompt;
pub mod render;
pub mod use_cases;

// Re-export commonly used types
pub use config::PromptConfig;
pub use ports::{
    chat_view::ChatView,
    completion::{CompletionProvider, PromptMessage, PromptRole, ProviderError, TokenStream},
    message_store::{MessageStore, StoreError},
};
pub use render::{RenderStream, StreamRenderer};
pub use use_cases::load_history::LoadHistoryUseCase;
pub use use_cases::submit_message::{
    SubmitError, SubmitMessageInput, SubmitMessageUseCase, SubmitOutcome,
};
