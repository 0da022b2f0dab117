//! Chat view port
//!
//! Use cases produce render trees but do not own page markup; the
//! presentation layer supplies it through this trait.

use streamchat_domain::{Author, RenderNode};

pub const INVALID_MESSAGE: &str = "Invalid message.";
pub const SAVE_FAILED: &str = "Failed to save message.";
pub const COMPLETION_FAILED: &str = "Failed to generate completion.";
pub const REPLY_SAVE_FAILED: &str = "Failed to save reply.";

/// Markup for the pieces of a chat the orchestrator emits
pub trait ChatView: Send + Sync {
    /// A chat message whose body may still contain pending nodes
    fn message(&self, author: Author, body: RenderNode) -> RenderNode;

    /// Fallback markup for a whole message that has not started yet
    fn pending_message(&self, author: Author) -> String;

    /// Fallback markup for the not-yet-streamed rest of a reply
    fn typing_indicator(&self) -> String;

    /// User-visible error markup
    fn error(&self, text: &str) -> String;
}
