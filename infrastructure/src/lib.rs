//! Infrastructure layer for streamchat
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileChatConfig, FileConfig, FileDatabaseConfig,
    FileLoggingConfig, FileProviderConfig, FileServerConfig,
};
pub use providers::OpenAiCompletionProvider;
pub use storage::SqliteMessageStore;
