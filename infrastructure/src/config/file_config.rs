//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys take their defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use streamchat_application::PromptConfig;
use streamchat_application::config::{DEFAULT_SYSTEM_PROMPT, DEFAULT_WELCOME_MESSAGE};
use streamchat_domain::ChatId;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("server.bind is not a socket address: {0:?}")]
    InvalidBindAddress(String),

    #[error("provider.model cannot be empty")]
    EmptyModelName,

    #[error("provider.idle_timeout_secs cannot be 0")]
    InvalidTimeout,

    #[error("chat.default_chat_id must be a positive safe integer, got {0}")]
    InvalidChatId(i64),

    #[error("database.path cannot be empty")]
    EmptyDatabasePath,
}

/// Raw HTTP server configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Listen address
    pub bind: String,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Raw database configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDatabaseConfig {
    /// SQLite database file, created if missing
    pub path: PathBuf,
}

impl Default for FileDatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chat.db"),
        }
    }
}

/// Raw model provider configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Maximum silence between two stream events
    pub idle_timeout_secs: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            idle_timeout_secs: 30,
        }
    }
}

impl FileProviderConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Raw chat configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Chat shown by the page routes
    pub default_chat_id: i64,
    pub welcome_message: String,
    pub system_prompt: String,
}

impl Default for FileChatConfig {
    fn default() -> Self {
        Self {
            default_chat_id: ChatId::DEFAULT.get(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl FileChatConfig {
    pub fn prompt_config(&self) -> PromptConfig {
        PromptConfig::new(&self.system_prompt, &self.welcome_message)
    }
}

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// `EnvFilter` directive, overrides the `-v` level
    pub filter: Option<String>,
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub database: FileDatabaseConfig,
    pub provider: FileProviderConfig,
    pub chat: FileChatConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.bind_addr()?;

        if self.provider.model.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }

        if self.provider.idle_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        self.default_chat_id()?;

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyDatabasePath);
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigValidationError::InvalidBindAddress(self.server.bind.clone()))
    }

    pub fn default_chat_id(&self) -> Result<ChatId, ConfigValidationError> {
        let id = self.chat.default_chat_id;
        match ChatId::new(id) {
            Ok(chat_id) if id > 0 => Ok(chat_id),
            _ => Err(ConfigValidationError::InvalidChatId(id)),
        }
    }
}
