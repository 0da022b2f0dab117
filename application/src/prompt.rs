//! Prompt assembly for a chat turn

use crate::config::PromptConfig;
use crate::ports::completion::{PromptMessage, PromptRole};
use streamchat_domain::Message;

/// Build the model prompt for a new user turn.
///
/// Turns, in order: the system instruction, the welcome message as an
/// assistant turn, the stored history, then `text` as the user turn.
/// `history` must not already contain `text`.
pub fn build_prompt(config: &PromptConfig, history: &[Message], text: &str) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(history.len() + 3);
    prompt.push(PromptMessage::new(PromptRole::System, &config.system_prompt));
    prompt.push(PromptMessage::new(
        PromptRole::Assistant,
        &config.welcome_message,
    ));
    prompt.extend(
        history
            .iter()
            .map(|message| PromptMessage::new(message.author.into(), &message.text)),
    );
    prompt.push(PromptMessage::new(PromptRole::User, text));
    prompt
}
