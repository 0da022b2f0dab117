//! Request handlers
//!
//! Page routes render the whole document; the completion route renders only
//! the nodes appended to the message list.

use super::response::html_stream;
use super::state::AppState;
use axum::Form;
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use streamchat_application::SubmitMessageInput;
use streamchat_domain::{ChatId, Message, RenderNode};
use tracing::warn;

/// Raw chat form; missing fields are caught by validation
#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(rename = "chatId", default)]
    chat_id: String,
    #[serde(default)]
    text: String,
}

impl From<ChatForm> for SubmitMessageInput {
    fn from(form: ChatForm) -> Self {
        SubmitMessageInput::new(form.chat_id, form.text)
    }
}

async fn load_history(state: &AppState, chat_id: ChatId) -> Vec<Message> {
    match state.history.load(chat_id).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(chat = %chat_id, "Failed to load history: {}", e);
            Vec::new()
        }
    }
}

fn page(state: &AppState, history: &[Message], submission: Option<RenderNode>) -> RenderNode {
    state
        .view
        .page(state.default_chat, &state.welcome, history, submission)
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Response {
    let history = load_history(&state, state.default_chat).await;
    html_stream("/", state.renderer.render(page(&state, &history, None)))
}

/// `POST /`: full-page submission, for browsers without the client bundle
pub async fn submit_page(State(state): State<AppState>, Form(form): Form<ChatForm>) -> Response {
    let history = load_history(&state, state.default_chat).await;
    let outcome = state.submit.submit(form.into(), &history).await;
    let tree = page(&state, &history, Some(outcome.into_node()));
    html_stream("/", state.renderer.render(tree))
}

/// `POST /chat/completion`: the echo and pending reply only
pub async fn completion(State(state): State<AppState>, Form(form): Form<ChatForm>) -> Response {
    let history = match form.chat_id.parse::<ChatId>() {
        Ok(chat_id) => load_history(&state, chat_id).await,
        Err(_) => Vec::new(),
    };
    let outcome = state.submit.submit(form.into(), &history).await;
    html_stream("/chat/completion", state.renderer.render(outcome.into_node()))
}
