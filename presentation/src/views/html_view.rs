//! HTML implementation of the chat view port

use super::components::{chat_message, chat_message_markup, chat_view, document, error_message};
use streamchat_application::ChatView;
use streamchat_domain::{Author, ChatId, Message, RenderNode};

const PAGE_TITLE: &str = "GPT Chat";

/// The chat markup, as served to browsers
#[derive(Debug, Clone, Default)]
pub struct HtmlChatView;

impl HtmlChatView {
    pub fn new() -> Self {
        Self
    }

    /// Full page: welcome message, stored history, then `submission` (the
    /// echo and pending reply of a form post, if any).
    pub fn page(
        &self,
        chat_id: ChatId,
        welcome: &str,
        history: &[Message],
        submission: Option<RenderNode>,
    ) -> RenderNode {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(RenderNode::raw(chat_message_markup(Author::Bot, welcome)));
        messages.extend(
            history
                .iter()
                .map(|m| RenderNode::raw(chat_message_markup(m.author, &m.text))),
        );
        messages.extend(submission);

        document(PAGE_TITLE, chat_view(chat_id, RenderNode::sequence(messages)))
    }
}

impl ChatView for HtmlChatView {
    fn message(&self, author: Author, body: RenderNode) -> RenderNode {
        chat_message(author, body)
    }

    fn pending_message(&self, author: Author) -> String {
        chat_message_markup(author, "...")
    }

    fn typing_indicator(&self) -> String {
        "...".to_string()
    }

    fn error(&self, text: &str) -> String {
        error_message(text)
    }
}
