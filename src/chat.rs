//! The streaming chat session.

use futures::StreamExt;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::event::ServerEvent;
use crate::exchange::{Exchange, ExchangeOutcome, Flow};
use crate::input::validate_message;
use crate::message::Message;
use crate::session::SessionId;
use crate::sse::SseFrame;
use crate::transport::{ChatRequest, EventTransport};
use crate::view::{ChatView, ToastLevel};

/// Greeting rendered once when the session starts.
pub const WELCOME_MESSAGE: &str = "**Welcome to MediBot AI**\n\n\
    I can help with medical symptoms and conditions, medication information, \
    treatment options, and health and wellness advice.\n\n\
    *Always consult a healthcare professional for medical decisions.*";

/// One chat conversation: a session identifier, a transport, and a view.
///
/// Each call to [`send_message`](Self::send_message) runs one exchange to
/// completion; exchanges never overlap.
pub struct ChatSession<T: EventTransport, V: ChatView> {
    config: ChatConfig,
    transport: T,
    view: V,
    session_id: SessionId,
    history: Vec<Message>,
    started: bool,
}

impl<T: EventTransport, V: ChatView> ChatSession<T, V> {
    /// Creates a session with a freshly generated identifier.
    #[must_use]
    pub fn new(config: ChatConfig, transport: T, view: V) -> Self {
        let session_id = SessionId::generate();
        log::info!("Chat session initialized: {session_id}");
        Self {
            config,
            transport,
            view,
            session_id,
            history: Vec::new(),
            started: false,
        }
    }

    /// Replaces the generated session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    /// Runs the one-time startup sequence: renders the welcome message.
    ///
    /// Returns `false` if the session was already started.
    pub fn start(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.view.show_message(&Message::assistant(WELCOME_MESSAGE));
        true
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    pub const fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Finished messages: every sent user message and each completed answer.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Sends a canned query through the normal send path.
    ///
    /// # Errors
    ///
    /// See [`send_message`](Self::send_message).
    pub async fn send_quick_action(&mut self, query: &str) -> Result<ExchangeOutcome> {
        self.send_message(query).await
    }

    /// Sends `text` and streams the answer into the view.
    ///
    /// Transport, server and timeout failures are rendered in the
    /// conversation and reported through the returned [`ExchangeOutcome`];
    /// the session stays usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the text is empty or too long. In
    /// that case a warning toast is shown and nothing is sent.
    pub async fn send_message(&mut self, text: &str) -> Result<ExchangeOutcome> {
        let message = match validate_message(text, self.config.max_message_chars) {
            Ok(message) => message.to_string(),
            Err(e) => {
                self.view.toast(ToastLevel::Warning, &e.to_string());
                return Err(Error::Validation(e));
            }
        };

        log::info!("Sending message ({} chars)", message.chars().count());
        let user_message = Message::user(message.clone());
        self.view.show_message(&user_message);
        self.history.push(user_message);

        let outcome = self.run_exchange(message).await?;
        if let ExchangeOutcome::Completed(answer) = &outcome {
            self.history.push(answer.clone());
        }
        Ok(outcome)
    }

    async fn run_exchange(&mut self, message: String) -> Result<ExchangeOutcome> {
        let mut exchange = Exchange::new();
        exchange.begin(&mut self.view);

        let timeout = tokio::time::sleep(self.config.response_timeout());
        tokio::pin!(timeout);

        let request = ChatRequest::new(message, self.session_id.clone());
        let opened = tokio::select! {
            result = self.transport.open(&request) => Some(result),
            () = &mut timeout => None,
        };

        let mut frames = match opened {
            None => {
                exchange.on_timeout(&mut self.view);
                return finish(&exchange);
            }
            Some(Err(Error::Url(e))) => {
                log::error!("Send message error: {e}");
                exchange.on_send_failed(&mut self.view);
                return finish(&exchange);
            }
            Some(Err(e)) => {
                log::error!("Event stream connection failed: {e}");
                exchange.on_transport_closed(&mut self.view);
                return finish(&exchange);
            }
            Some(Ok(frames)) => frames,
        };
        log::debug!("Event stream opened");

        loop {
            tokio::select! {
                frame = frames.next() => {
                    let flow = match frame {
                        Some(Ok(frame)) => self.dispatch(&mut exchange, &frame),
                        Some(Err(e)) => {
                            log::error!("Event stream error: {e}");
                            exchange.on_transport_closed(&mut self.view)
                        }
                        None => {
                            log::debug!("Event stream ended");
                            exchange.on_transport_closed(&mut self.view)
                        }
                    };
                    if flow == Flow::Close {
                        break;
                    }
                }
                () = &mut timeout => {
                    exchange.on_timeout(&mut self.view);
                    break;
                }
            }
        }
        drop(frames);

        finish(&exchange)
    }

    fn dispatch(&mut self, exchange: &mut Exchange, frame: &SseFrame) -> Flow {
        if !frame.is_message() {
            log::debug!("Skipping named event {:?}", frame.event);
            return Flow::Continue;
        }
        match ServerEvent::parse(&frame.data) {
            Ok(Some(event)) => exchange.on_event(event, &mut self.view),
            Ok(None) => Flow::Continue,
            Err(e) => {
                log::error!("Error parsing event data: {e}: {}", frame.data);
                Flow::Continue
            }
        }
    }
}

fn finish(exchange: &Exchange) -> Result<ExchangeOutcome> {
    exchange
        .outcome()
        .ok_or_else(|| Error::Transport("exchange ended without terminating".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;

    use crate::exchange::{CONNECTION_ERROR, SEND_ERROR, TIMEOUT_ERROR};
    use crate::message::Role;
    use crate::transport::FrameStream;
    use crate::view::{RecordingView, ViewEvent};

    /// What a scripted stream does after its frames run out.
    #[derive(Clone, Copy)]
    enum Tail {
        /// Stream ends (server closed the connection).
        End,
        /// Stream stays open forever.
        Hang,
        /// Stream yields a transport error.
        Fail,
    }

    enum Script {
        /// Frames, a pause, more frames, then the tail.
        Stream {
            head: Vec<SseFrame>,
            pause: Duration,
            rest: Vec<SseFrame>,
            tail: Tail,
        },
        RefuseConnection,
        BadUrl,
    }

    impl Script {
        fn frames(frames: Vec<SseFrame>, tail: Tail) -> Self {
            Self::Stream {
                head: frames,
                pause: Duration::ZERO,
                rest: Vec::new(),
                tail,
            }
        }

        fn paused(head: Vec<SseFrame>, pause: Duration, rest: Vec<SseFrame>, tail: Tail) -> Self {
            Self::Stream {
                head,
                pause,
                rest,
                tail,
            }
        }
    }

    struct ScriptedTransport {
        script: Mutex<Vec<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(scripts.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn scripted_stream(
        head: Vec<SseFrame>,
        pause: Duration,
        rest: Vec<SseFrame>,
        tail: Tail,
    ) -> FrameStream {
        let head = stream::iter(head.into_iter().map(Ok));
        let pause = stream::once(tokio::time::sleep(pause))
            .filter_map(|()| async { None::<Result<SseFrame>> });
        let body = head.chain(pause).chain(stream::iter(rest.into_iter().map(Ok)));
        match tail {
            Tail::End => body.boxed(),
            Tail::Hang => body.chain(stream::pending()).boxed(),
            Tail::Fail => body
                .chain(stream::once(async {
                    Err(Error::Transport("connection reset".to_string()))
                }))
                .boxed(),
        }
    }

    #[async_trait]
    impl EventTransport for ScriptedTransport {
        async fn open(&self, request: &ChatRequest) -> Result<FrameStream> {
            self.requests.lock().unwrap().push(request.clone());
            let script = self.script.lock().unwrap().pop().expect("script exhausted");
            match script {
                Script::Stream {
                    head,
                    pause,
                    rest,
                    tail,
                } => Ok(scripted_stream(head, pause, rest, tail)),
                Script::RefuseConnection => Err(Error::Transport("connection refused".into())),
                Script::BadUrl => Err(Error::Url("bad".into())),
            }
        }
    }

    fn data(json: &str) -> SseFrame {
        SseFrame::message(json)
    }

    fn chunk(text: &str) -> SseFrame {
        data(&serde_json::json!({"type": "answer_chunk", "content": text}).to_string())
    }

    fn sources(names: &[&str]) -> SseFrame {
        data(&serde_json::json!({"type": "sources", "content": names}).to_string())
    }

    fn error(text: &str) -> SseFrame {
        data(&serde_json::json!({"type": "error", "content": text}).to_string())
    }

    fn session(scripts: Vec<Script>) -> ChatSession<ScriptedTransport, RecordingView> {
        ChatSession::new(
            ChatConfig::default(),
            ScriptedTransport::new(scripts),
            RecordingView::new(),
        )
    }

    fn enabled_count(view: &RecordingView) -> usize {
        view.count(|e| matches!(e, ViewEvent::InputEnabled))
    }

    fn user_renders(view: &RecordingView) -> usize {
        view.count(|e| matches!(e, ViewEvent::Message(m) if m.role == Role::User))
    }

    #[tokio::test]
    async fn streams_chunks_then_completes() {
        let mut chat = session(vec![Script::frames(
            vec![chunk("Rest, "), chunk("fluids, "), chunk("and sleep."), sources(&["a/b.pdf"])],
            Tail::Hang,
        )]);

        let outcome = chat.send_message("  how to treat a cold?  ").await.unwrap();

        let ExchangeOutcome::Completed(answer) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(answer.content, "Rest, fluids, and sleep.");
        assert_eq!(answer.sources[0].name, "b.pdf");

        let view = chat.view();
        assert_eq!(user_renders(view), 1);
        assert_eq!(view.assistant_text(), Some("Rest, fluids, and sleep."));
        assert_eq!(view.count(|e| matches!(e, ViewEvent::Sources(_))), 1);
        assert_eq!(enabled_count(view), 1);
        assert!(view.input_enabled());

        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[0].content, "how to treat a cold?");
        assert_eq!(chat.history()[1].role, Role::Assistant);

        let requests = chat.transport.requests.lock().unwrap();
        assert_eq!(requests[0].message, "how to treat a cold?");
        assert_eq!(&requests[0].session_id, chat.session_id());
    }

    #[tokio::test]
    async fn input_is_disabled_before_request_and_user_rendered_first() {
        let mut chat = session(vec![Script::frames(vec![sources(&[])], Tail::End)]);
        chat.send_message("hello").await.unwrap();
        let events = &chat.view().events;
        assert!(matches!(events[0], ViewEvent::Message(_)));
        assert_eq!(events[1], ViewEvent::InputDisabled);
        assert_eq!(events[2], ViewEvent::WorkingShown);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_without_request() {
        let mut chat = session(vec![]);

        let empty = chat.send_message("   ").await;
        assert!(matches!(empty, Err(Error::Validation(_))));
        let long = chat.send_message(&"x".repeat(1001)).await;
        assert!(matches!(long, Err(Error::Validation(_))));

        let view = chat.view();
        assert_eq!(
            view.events,
            vec![
                ViewEvent::Toast(ToastLevel::Warning, "Please enter a message".into()),
                ViewEvent::Toast(
                    ToastLevel::Warning,
                    "Message too long. Please keep it under 1000 characters.".into()
                ),
            ]
        );
        assert!(chat.transport.requests.lock().unwrap().is_empty());
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped() {
        let mut chat = session(vec![Script::frames(
            vec![chunk("a"), data("{not json"), chunk("b"), sources(&[])],
            Tail::Hang,
        )]);
        let outcome = chat.send_message("q").await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Completed(ref m) if m.content == "ab"));
        assert!(chat.view().errors().is_empty());
    }

    #[tokio::test]
    async fn named_events_and_unknown_types_are_ignored() {
        let mut ping = data(r#"{"type":"answer_chunk","content":"IGNORED"}"#);
        ping.event = Some("ping".into());
        let mut chat = session(vec![Script::frames(
            vec![ping, data(r#"{"type":"heartbeat"}"#), chunk("ok"), sources(&[])],
            Tail::End,
        )]);
        let outcome = chat.send_message("q").await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Completed(ref m) if m.content == "ok"));
    }

    #[tokio::test]
    async fn warning_is_rendered_without_terminating() {
        let mut chat = session(vec![Script::frames(
            vec![
                data(r#"{"type":"medical_warning","content":"Seek emergency care"}"#),
                chunk("answer"),
                sources(&[]),
            ],
            Tail::End,
        )]);
        chat.send_message("chest pain").await.unwrap();
        let view = chat.view();
        assert_eq!(
            view.count(|e| matches!(e, ViewEvent::Warning(w) if w == "Seek emergency care")),
            1
        );
        assert_eq!(enabled_count(view), 1);
    }

    #[tokio::test]
    async fn server_error_before_content() {
        let mut chat = session(vec![Script::frames(vec![error("Service unavailable")], Tail::Fail)]);
        let outcome = chat.send_message("q").await.unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Errored {
                message: "Service unavailable".into(),
                partial: None
            }
        );
        let view = chat.view();
        assert_eq!(view.count(|e| matches!(e, ViewEvent::WorkingHidden)), 1);
        assert_eq!(view.errors(), vec!["Service unavailable"]);
        assert_eq!(enabled_count(view), 1);
        // only the user message is recorded
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test]
    async fn server_error_after_content_keeps_partial() {
        let mut chat = session(vec![Script::frames(
            vec![chunk("partial answer"), error("model crashed")],
            Tail::Fail,
        )]);
        chat.send_message("q").await.unwrap();
        let view = chat.view();
        assert_eq!(view.assistant_text(), Some("partial answer"));
        assert_eq!(view.errors(), vec!["model crashed"]);
        assert_eq!(enabled_count(view), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_hard_failure() {
        let mut chat = session(vec![Script::RefuseConnection]);
        let outcome = chat.send_message("q").await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Errored { .. }));
        assert_eq!(chat.view().errors(), vec![CONNECTION_ERROR]);
        assert_eq!(enabled_count(chat.view()), 1);
    }

    #[tokio::test]
    async fn bad_url_is_send_failure() {
        let mut chat = session(vec![Script::BadUrl]);
        chat.send_message("q").await.unwrap();
        assert_eq!(chat.view().errors(), vec![SEND_ERROR]);
        assert_eq!(enabled_count(chat.view()), 1);
    }

    #[tokio::test]
    async fn stream_error_before_content_is_hard_failure() {
        let mut chat = session(vec![Script::frames(vec![], Tail::Fail)]);
        chat.send_message("q").await.unwrap();
        assert_eq!(chat.view().errors(), vec![CONNECTION_ERROR]);
        assert_eq!(chat.view().count(|e| matches!(e, ViewEvent::WorkingHidden)), 1);
    }

    #[tokio::test]
    async fn close_after_content_is_benign() {
        let mut chat = session(vec![Script::frames(vec![chunk("all done")], Tail::End)]);
        let outcome = chat.send_message("q").await.unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Closed {
                partial: "all done".into()
            }
        );
        assert!(chat.view().errors().is_empty());
        assert_eq!(enabled_count(chat.view()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_any_event() {
        let mut chat = session(vec![Script::frames(vec![], Tail::Hang)]);
        let outcome = chat.send_message("q").await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::TimedOut);
        let view = chat.view();
        assert_eq!(view.errors(), vec![TIMEOUT_ERROR]);
        assert_eq!(view.count(|e| matches!(e, ViewEvent::WorkingHidden)), 1);
        assert_eq!(enabled_count(view), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_transport_error_enables_once() {
        // the transport would fail at 20s; the 15s timeout terminates first
        let mut chat = session(vec![Script::paused(
            vec![],
            Duration::from_secs(20),
            vec![],
            Tail::Fail,
        )]);
        let outcome = chat.send_message("q").await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::TimedOut);
        assert_eq!(chat.view().errors(), vec![TIMEOUT_ERROR]);
        assert_eq!(enabled_count(chat.view()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_after_first_chunk_closes_at_timeout() {
        let mut chat = session(vec![Script::frames(vec![chunk("partial")], Tail::Hang)]);
        let outcome = tokio::time::timeout(Duration::from_secs(3600), chat.send_message("q"))
            .await
            .expect("exchange must end at the response timeout")
            .unwrap();

        assert_eq!(
            outcome,
            ExchangeOutcome::Closed {
                partial: "partial".into()
            }
        );
        let view = chat.view();
        assert!(view.errors().is_empty());
        assert!(view.input_enabled());
        assert_eq!(enabled_count(view), 1);
        assert_eq!(view.assistant_text(), Some("partial"));
        // only the user message is recorded
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_chunks_after_timeout_are_dropped() {
        let mut chat = session(vec![Script::paused(
            vec![chunk("part one, ")],
            Duration::from_secs(20),
            vec![chunk("part two"), sources(&["x.pdf"])],
            Tail::Hang,
        )]);
        let outcome = chat.send_message("q").await.unwrap();

        assert_eq!(
            outcome,
            ExchangeOutcome::Closed {
                partial: "part one, ".into()
            }
        );
        assert!(chat.view().errors().is_empty());
        assert_eq!(enabled_count(chat.view()), 1);
        assert_eq!(chat.view().count(|e| matches!(e, ViewEvent::Sources(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_alone_does_not_stop_timeout() {
        let mut chat = session(vec![Script::frames(
            vec![data(r#"{"type":"medical_warning","content":"careful"}"#)],
            Tail::Hang,
        )]);
        let outcome = chat.send_message("q").await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::TimedOut);
    }

    #[tokio::test]
    async fn transport_error_after_sources_is_absorbed() {
        let mut chat = session(vec![Script::frames(vec![chunk("a"), sources(&[])], Tail::Fail)]);
        chat.send_message("q").await.unwrap();
        assert_eq!(enabled_count(chat.view()), 1);
        assert!(chat.view().errors().is_empty());
    }

    #[tokio::test]
    async fn session_is_reusable_after_failure() {
        let mut chat = session(vec![
            Script::RefuseConnection,
            Script::frames(vec![chunk("fine"), sources(&[])], Tail::End),
        ]);
        chat.send_message("first").await.unwrap();
        let outcome = chat.send_message("second").await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Completed(_)));
        assert_eq!(enabled_count(chat.view()), 2);

        let requests = chat.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].session_id, requests[1].session_id);
    }

    #[test]
    fn start_renders_welcome_once() {
        let mut chat = session(vec![]);
        assert!(chat.start());
        assert!(!chat.start());
        let welcomes = chat
            .view()
            .count(|e| matches!(e, ViewEvent::Message(m) if m.content == WELCOME_MESSAGE));
        assert_eq!(welcomes, 1);
    }

    #[tokio::test]
    async fn quick_action_uses_send_path() {
        let mut chat = session(vec![Script::frames(vec![chunk("ok"), sources(&[])], Tail::End)]);
        chat.send_quick_action("What are flu symptoms?").await.unwrap();
        assert_eq!(
            chat.transport.requests.lock().unwrap()[0].message,
            "What are flu symptoms?"
        );
    }
}
