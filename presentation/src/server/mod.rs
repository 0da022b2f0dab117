//! HTTP server

mod response;
mod routes;
mod state;

pub use state::AppState;

use axum::Router;
use axum::routing::{get, post};
use std::path::Path;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(routes::index).post(routes::submit_page))
        .route("/chat/completion", post(routes::completion))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use std::sync::Arc;
    use streamchat_application::{
        CompletionProvider, MessageStore, PromptConfig, PromptMessage, ProviderError,
        StreamRenderer, TokenStream,
    };
    use streamchat_domain::{Author, ChatId};
    use streamchat_infrastructure::SqliteMessageStore;

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn stream_completion(
            &self,
            _prompt: Vec<PromptMessage>,
        ) -> Result<TokenStream, ProviderError> {
            Ok(stream::iter(vec![Ok(Some("Hi".to_string())), Ok(None), Ok(Some(" there".to_string()))]).boxed())
        }
    }

    struct TestServer {
        base: String,
        store: Arc<SqliteMessageStore>,
        shutdown: CancellationToken,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    async fn start() -> TestServer {
        let store = Arc::new(SqliteMessageStore::open_in_memory().unwrap());
        store.ensure_chat(ChatId::DEFAULT).await.unwrap();
        let shutdown = CancellationToken::new();
        let state = AppState::new(
            store.clone(),
            Arc::new(EchoProvider),
            PromptConfig::default(),
            StreamRenderer::with_shutdown(shutdown.clone()),
        );
        let static_dir = std::env::temp_dir();
        let app = router(state, &static_dir);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, app, shutdown.clone()));
        TestServer {
            base,
            store,
            shutdown,
        }
    }

    #[tokio::test]
    async fn test_index_renders_welcome() {
        let server = start().await;
        let response = reqwest::get(format!("{}/", server.base)).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
        assert_eq!(response.headers()["cache-control"], "no-cache");
        let html = response.text().await.unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Welcome!"));
    }

    #[tokio::test]
    async fn test_completion_streams_fragment_and_stores_reply() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/chat/completion", server.base))
            .form(&[("chatId", "1"), ("text", "hello")])
            .send()
            .await
            .unwrap();
        let html = response.text().await.unwrap();

        assert!(!html.contains("<!DOCTYPE html>"));
        assert!(html.contains("Me:</span>"));
        assert!(html.contains(">Hi<"));
        assert!(html.contains("> there<"));

        let messages = server.store.list(ChatId::DEFAULT).await.unwrap();
        let stored: Vec<_> = messages.iter().map(|m| (m.author, m.text.as_str())).collect();
        assert_eq!(stored, vec![(Author::Me, "hello"), (Author::Bot, "Hi there")]);
    }

    #[tokio::test]
    async fn test_invalid_submission_renders_error() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/chat/completion", server.base))
            .form(&[("chatId", "abc"), ("text", "hello")])
            .send()
            .await
            .unwrap();
        let html = response.text().await.unwrap();

        assert_eq!(html, r#"<p class="text-red-500">Invalid message.</p>"#);
        assert!(server.store.list(ChatId::DEFAULT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_page_post_shows_history_and_reply() {
        let server = start().await;
        let client = reqwest::Client::new();
        for text in ["one", "two"] {
            client
                .post(format!("{}/", server.base))
                .form(&[("chatId", "1"), ("text", text)])
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
        }

        let html = reqwest::get(format!("{}/", server.base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let one = html.find(">one<").unwrap();
        let two = html.find(">two<").unwrap();
        assert!(one < two);
        assert_eq!(html.matches(">Hi there<").count(), 2);
    }
}
