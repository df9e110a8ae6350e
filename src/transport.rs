//! Event-stream transport: opens one SSE connection per chat request.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::session::SessionId;
use crate::sse::{SseCodec, SseFrame};

/// Frames of an open event stream. Dropping the stream closes the connection.
pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

/// Parameters of one outgoing chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: SessionId,
}

impl ChatRequest {
    #[must_use]
    pub fn new(message: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }

    /// Query parameters sent with the request.
    #[must_use]
    pub fn query(&self) -> [(&'static str, &str); 2] {
        [
            ("msg", self.message.as_str()),
            ("session_id", self.session_id.as_str()),
        ]
    }
}

/// Abstraction over opening a server-push connection, for testability.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Opens the event stream for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the request cannot be built, or a transport
    /// error if the connection cannot be established.
    async fn open(&self, request: &ChatRequest) -> Result<FrameStream>;
}

/// [`EventTransport`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ChatConfig,
}

impl HttpTransport {
    /// Creates a transport with a default HTTP client.
    #[must_use]
    pub fn new(config: ChatConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Creates a transport with a custom HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, config: ChatConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<FrameStream> {
        let url = self.config.endpoint_url()?;
        log::debug!("Opening event stream to {url}");

        let response = self
            .client
            .get(url)
            .query(&request.query())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(Error::Transport(format!(
                "unexpected content type '{content_type}'"
            )));
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let frames = FramedRead::new(StreamReader::new(body), SseCodec::new()).map_err(Error::Io);
        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::sse::{Event, Sse};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use std::collections::HashMap;

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn stream_handler(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        seen.lock().unwrap().push(params);
        let events = vec![
            Ok::<_, Infallible>(Event::default().data(r#"{"type":"answer_chunk","content":"Hi"}"#)),
            Ok(Event::default().comment("keep-alive")),
            Ok(Event::default().data(r#"{"type":"sources","content":[]}"#)),
        ];
        Sse::new(futures::stream::iter(events)).into_response()
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn request_query_pairs() {
        let request = ChatRequest::new("hello", SessionId::from_string("session_1_a"));
        assert_eq!(
            request.query(),
            [("msg", "hello"), ("session_id", "session_1_a")]
        );
    }

    #[tokio::test]
    async fn http_transport_streams_frames_and_sends_query() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/get", get(stream_handler))
            .with_state(Arc::clone(&seen));
        let base = serve(router).await;

        let transport = HttpTransport::new(ChatConfig::new().with_server_url(base));
        let request = ChatRequest::new("is 38°C a fever?", SessionId::from_string("session_9_x"));
        let frames: Vec<_> = transport.open(&request).await.unwrap().collect().await;

        let data: Vec<_> = frames.into_iter().map(|f| f.unwrap().data).collect();
        assert_eq!(
            data,
            vec![
                r#"{"type":"answer_chunk","content":"Hi"}"#.to_string(),
                r#"{"type":"sources","content":[]}"#.to_string(),
            ]
        );

        let params = seen.lock().unwrap()[0].clone();
        assert_eq!(params["msg"], "is 38°C a fever?");
        assert_eq!(params["session_id"], "session_9_x");
    }

    #[tokio::test]
    async fn http_transport_rejects_error_status() {
        let router = Router::new().route(
            "/get",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let base = serve(router).await;

        let transport = HttpTransport::new(ChatConfig::new().with_server_url(base));
        let request = ChatRequest::new("hi", SessionId::generate());
        let result = transport.open(&request).await;
        assert!(matches!(result, Err(Error::Status(503))));
    }

    #[tokio::test]
    async fn http_transport_rejects_non_stream_content() {
        let router = Router::new().route("/get", get(|| async { "plain text" }));
        let base = serve(router).await;

        let transport = HttpTransport::new(ChatConfig::new().with_server_url(base));
        let request = ChatRequest::new("hi", SessionId::generate());
        assert!(matches!(
            transport.open(&request).await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn http_transport_fails_on_overlong_line() {
        let line = format!("data: {}", "x".repeat(crate::sse::DEFAULT_MAX_LINE_BYTES));
        let router = Router::new().route(
            "/get",
            get(move || async move { ([(CONTENT_TYPE, "text/event-stream")], line) }),
        );
        let base = serve(router).await;

        let transport = HttpTransport::new(ChatConfig::new().with_server_url(base));
        let request = ChatRequest::new("hi", SessionId::generate());
        let mut frames = transport.open(&request).await.unwrap();
        assert!(matches!(frames.next().await, Some(Err(Error::Io(_)))));
    }

    #[tokio::test]
    async fn http_transport_bad_url_is_url_error() {
        let transport = HttpTransport::new(ChatConfig::new().with_server_url("::nope::"));
        let request = ChatRequest::new("hi", SessionId::generate());
        assert!(matches!(transport.open(&request).await, Err(Error::Url(_))));
    }
}
