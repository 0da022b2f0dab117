//! Submit Message use case.
//!
//! Validates a chat form, stores the user's message and builds the render
//! tree for the response: the echoed message plus a pending Bot reply that
//! streams the model output in place.
//!
//! The reply is a chain of boundaries. Each link's source pulls model output
//! until it has one non-empty fragment, then resolves to that fragment
//! followed by the next link. The last link stores the complete reply before
//! it ends, so its boundary resolves only after the Bot message exists.

use crate::config::PromptConfig;
use crate::ports::chat_view::{
    COMPLETION_FAILED, ChatView, INVALID_MESSAGE, REPLY_SAVE_FAILED, SAVE_FAILED,
};
use crate::ports::completion::{CompletionProvider, PromptMessage, TokenStream};
use crate::ports::message_store::{MessageStore, StoreError};
use crate::prompt::build_prompt;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use streamchat_domain::{
    Author, ChatId, DomainError, Message, NewMessage, Pending, RenderNode, SourceError,
    Submission, preview,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a submission was rejected
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Raw form fields, as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitMessageInput {
    pub chat_id: String,
    pub text: String,
}

impl SubmitMessageInput {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

/// Result of a submission, ready to be rendered
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The message was stored; `reply` streams the model's answer
    Accepted { echo: RenderNode, reply: RenderNode },
    /// Nothing was sent to the model
    Rejected {
        error: RenderNode,
        reason: SubmitError,
    },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }

    /// The nodes to place after the chat history
    pub fn into_node(self) -> RenderNode {
        match self {
            SubmitOutcome::Accepted { echo, reply } => RenderNode::sequence([echo, reply]),
            SubmitOutcome::Rejected { error, .. } => error,
        }
    }
}

/// Called with the full reply text once the model output ends
type CompletionCallback =
    Box<dyn FnOnce(String) -> BoxFuture<'static, Result<(), SourceError>> + Send>;

/// Remaining model output of one reply, rendered one link at a time
struct ReplyChain {
    tokens: TokenStream,
    fragments: Vec<String>,
    on_complete: CompletionCallback,
    fallback: String,
    error_markup: String,
}

impl ReplyChain {
    fn into_node(self) -> RenderNode {
        let fallback = self.fallback.clone();
        Pending::from_stream(
            fallback,
            stream::once(self.advance()).filter_map(future::ready),
        )
        .into()
    }

    // Boxed: the future contains the next link, which contains the next future.
    fn advance(mut self) -> BoxFuture<'static, Option<Result<RenderNode, SourceError>>> {
        async move {
            loop {
                let next = self.tokens.next().await;
                match next {
                    Some(Ok(Some(fragment))) if !fragment.is_empty() => {
                        let text = RenderNode::text(&fragment);
                        self.fragments.push(fragment);
                        return Some(Ok(RenderNode::sequence([text, self.into_node()])));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(
                            fragments = self.fragments.len(),
                            "Completion stream failed: {}", e
                        );
                        return Some(Err(
                            SourceError::new(e.to_string()).with_markup(self.error_markup)
                        ));
                    }
                    None => {
                        let reply = self.fragments.concat();
                        return (self.on_complete)(reply).await.err().map(Err);
                    }
                }
            }
        }
        .boxed()
    }
}

/// Use case for submitting a chat message.
///
/// Dependencies are injected at construction so that isolated instances
/// (e.g. with scripted providers) can run side by side.
#[derive(Clone)]
pub struct SubmitMessageUseCase {
    store: Arc<dyn MessageStore>,
    provider: Arc<dyn CompletionProvider>,
    view: Arc<dyn ChatView>,
    prompt: PromptConfig,
}

impl SubmitMessageUseCase {
    pub fn new(
        store: Arc<dyn MessageStore>,
        provider: Arc<dyn CompletionProvider>,
        view: Arc<dyn ChatView>,
        prompt: PromptConfig,
    ) -> Self {
        Self {
            store,
            provider,
            view,
            prompt,
        }
    }

    /// Validate and store `input`, then build the response tree.
    ///
    /// `history` is the chat's messages before this submission. The model is
    /// not called here: it starts when the renderer first polls the reply.
    pub async fn submit(&self, input: SubmitMessageInput, history: &[Message]) -> SubmitOutcome {
        let submission = match Submission::parse(&input.chat_id, &input.text) {
            Ok(submission) => submission,
            Err(e) => {
                warn!("Rejected submission: {}", e);
                return self.reject(INVALID_MESSAGE, e.into());
            }
        };

        let Submission { chat_id, text } = submission;
        if let Err(e) = self
            .store
            .insert(NewMessage::from_me(chat_id, text.clone()))
            .await
        {
            warn!(chat = %chat_id, "Failed to store message: {}", e);
            return self.reject(SAVE_FAILED, e.into());
        }

        info!(chat = %chat_id, "Accepted message: {}", preview(&text, 80));

        let prompt = build_prompt(&self.prompt, history, &text);
        SubmitOutcome::Accepted {
            echo: self.view.message(Author::Me, RenderNode::text(&text)),
            reply: self.reply(chat_id, prompt),
        }
    }

    fn reject(&self, text: &str, reason: SubmitError) -> SubmitOutcome {
        SubmitOutcome::Rejected {
            error: RenderNode::raw(self.view.error(text)),
            reason,
        }
    }

    fn reply(&self, chat_id: ChatId, prompt: Vec<PromptMessage>) -> RenderNode {
        let provider = self.provider.clone();
        let view = self.view.clone();
        let on_complete = self.store_reply(chat_id);

        Pending::once(self.view.pending_message(Author::Bot), async move {
            debug!(chat = %chat_id, turns = prompt.len(), "Starting completion");
            match provider.stream_completion(prompt).await {
                Ok(tokens) => {
                    let chain = ReplyChain {
                        tokens,
                        fragments: Vec::new(),
                        on_complete,
                        fallback: view.typing_indicator(),
                        error_markup: view.error(COMPLETION_FAILED),
                    };
                    Ok(view.message(Author::Bot, chain.into_node()))
                }
                Err(e) => {
                    warn!(chat = %chat_id, "Failed to start completion: {}", e);
                    Err(SourceError::new(e.to_string()).with_markup(view.error(COMPLETION_FAILED)))
                }
            }
        })
        .into()
    }

    fn store_reply(&self, chat_id: ChatId) -> CompletionCallback {
        let store = self.store.clone();
        let error_markup = self.view.error(REPLY_SAVE_FAILED);
        Box::new(move |text: String| {
            async move {
                match store.insert(NewMessage::from_bot(chat_id, text)).await {
                    Ok(saved) => {
                        debug!(chat = %chat_id, id = saved.id, bytes = saved.text.len(), "Stored reply");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(chat = %chat_id, "Failed to store reply: {}", e);
                        Err(SourceError::new(e.to_string()).with_markup(error_markup))
                    }
                }
            }
            .boxed()
        })
    }
}
