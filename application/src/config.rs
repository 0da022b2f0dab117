//! Application-level configuration.
//!
//! Controls how the orchestrator frames a conversation for the model.

/// Greeting shown at the top of every chat and replayed to the model
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome! I'm here to help you with your Web Programming related tasks, what can I assist with?";

/// Instruction sent as the system turn of every prompt
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Respond with helpful code blocks in the context of the request.";

/// Prompt framing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// System instruction, first turn of every prompt.
    pub system_prompt: String,
    /// Assistant greeting, replayed as the second turn.
    pub welcome_message: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn new(system_prompt: impl Into<String>, welcome_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            welcome_message: welcome_message.into(),
        }
    }
}
