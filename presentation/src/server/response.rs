//! Streamed HTML responses

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;
use streamchat_application::RenderStream;
use tracing::debug;

/// Logs when the body is dropped before the render finished
struct DisconnectGuard {
    route: &'static str,
    finished: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!(route = self.route, "Client went away before the response finished");
        }
    }
}

/// Wrap a render stream as a chunked `text/html` response
pub fn html_stream(route: &'static str, mut stream: RenderStream) -> Response {
    let body = async_stream::stream! {
        let mut guard = DisconnectGuard { route, finished: false };
        while let Some(chunk) = stream.next().await {
            yield Ok::<Bytes, Infallible>(chunk);
        }
        guard.finished = true;
    };

    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
