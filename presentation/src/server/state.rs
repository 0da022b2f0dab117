//! Shared request state

use crate::views::HtmlChatView;
use std::sync::Arc;
use streamchat_application::{
    ChatView, CompletionProvider, LoadHistoryUseCase, MessageStore, PromptConfig, StreamRenderer,
    SubmitMessageUseCase,
};
use streamchat_domain::ChatId;

/// Everything a handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub(crate) submit: SubmitMessageUseCase,
    pub(crate) history: LoadHistoryUseCase,
    pub(crate) renderer: StreamRenderer,
    pub(crate) view: HtmlChatView,
    pub(crate) default_chat: ChatId,
    pub(crate) welcome: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MessageStore>,
        provider: Arc<dyn CompletionProvider>,
        prompt: PromptConfig,
        renderer: StreamRenderer,
    ) -> Self {
        let view = HtmlChatView::new();
        let welcome: Arc<str> = Arc::from(prompt.welcome_message.as_str());
        let chat_view: Arc<dyn ChatView> = Arc::new(view.clone());
        Self {
            submit: SubmitMessageUseCase::new(store.clone(), provider, chat_view, prompt),
            history: LoadHistoryUseCase::new(store),
            renderer,
            view,
            default_chat: ChatId::DEFAULT,
            welcome,
        }
    }

    /// Chat shown by the page routes
    pub fn with_default_chat(mut self, chat_id: ChatId) -> Self {
        self.default_chat = chat_id;
        self
    }
}
