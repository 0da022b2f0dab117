//! OpenAI-compatible streaming chat completions
//!
//! Posts the prompt to `{base_url}/chat/completions` with `stream: true` and
//! maps the server-sent events onto a [`TokenStream`]:
//!
//! - `choices[0].delta.content` becomes a fragment (`None` when absent)
//! - `data: [DONE]` or end of body ends the stream
//! - anything that does not parse as a chunk is a [`ProviderError::MalformedChunk`]
//!
//! The response body is read only as the token stream is polled; dropping the
//! stream closes the connection.

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::pin::pin;
use std::time::Duration;
use streamchat_application::{CompletionProvider, PromptMessage, ProviderError, TokenStream};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::FileProviderConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One decoded SSE event
#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Delta(Option<String>),
    Done,
}

fn parse_event(data: &str) -> Result<StreamEvent, ProviderError> {
    if data.trim() == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::MalformedChunk(format!("{e}: {data}")))?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    Ok(StreamEvent::Delta(content))
}

/// Decode an SSE byte stream into model output fragments.
fn token_stream<S>(body: S, idle_timeout: Duration) -> TokenStream
where
    S: Stream<Item = Result<Bytes, String>> + Send + 'static,
{
    stream! {
        let mut events = pin!(body.eventsource());
        loop {
            let event = match timeout(idle_timeout, events.next()).await {
                Ok(Some(Ok(event))) => event,
                Ok(Some(Err(e))) => {
                    yield Err(ProviderError::StreamError(e.to_string()));
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(?idle_timeout, "Completion stream went idle");
                    yield Err(ProviderError::Timeout);
                    break;
                }
            };

            match parse_event(&event.data) {
                Ok(StreamEvent::Delta(content)) => {
                    trace!(?content, "Completion delta");
                    yield Ok(content);
                }
                Ok(StreamEvent::Done) => break,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// [`CompletionProvider`] for OpenAI-compatible chat completion APIs
pub struct OpenAiCompletionProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    idle_timeout: Duration,
}

impl OpenAiCompletionProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        idle_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            api_key_env: String::new(),
            idle_timeout,
        })
    }

    /// Build from configuration, reading the key from `api_key_env`.
    ///
    /// A missing key is not an error here: the server starts, and each
    /// completion fails with [`ProviderError::MissingApiKey`].
    pub fn from_config(config: &FileProviderConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!("{} is not set; completions will fail", config.api_key_env);
        }
        let mut provider = Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.idle_timeout(),
        )?;
        provider.api_key_env = config.api_key_env.clone();
        Ok(provider)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn stream_completion(
        &self,
        prompt: Vec<PromptMessage>,
    ) -> Result<TokenStream, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey(self.api_key_env.clone()))?;

        let url = self.endpoint();
        debug!(url, model = %self.model, turns = prompt.len(), "POST chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatRequest {
                model: &self.model,
                messages: &prompt,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::ConnectionError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes_stream().map_err(|e| e.to_string());
        Ok(token_stream(body, self.idle_timeout))
    }
}
