//! Per-request state machine for one streamed answer.
//!
//! An [`Exchange`] turns server events, transport failures and the timeout
//! into rendering commands. Once it reaches a terminal state every further
//! input is ignored, which is what keeps the input from being re-enabled
//! twice when both a terminal event and a transport close arrive.

use crate::event::ServerEvent;
use crate::message::Message;
use crate::view::ChatView;

/// Shown when the connection fails before any answer text arrived.
pub const CONNECTION_ERROR: &str = "Connection error. Please refresh the page and try again.";

/// Shown when the first response does not arrive in time.
pub const TIMEOUT_ERROR: &str = "Request timed out. Please try again.";

/// Shown when the request could not even be built.
pub const SEND_ERROR: &str = "Failed to send message. Please try again.";

/// Lifecycle of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    /// Request sent, no answer text yet.
    Sent,
    /// At least one answer chunk received.
    Streaming,
    /// `sources` received.
    Completed,
    /// Server error event, transport failure before content, or send failure.
    Errored,
    /// No response within the timeout.
    TimedOut,
    /// Transport closed or timeout fired after content, without a terminal event.
    Closed,
}

impl ExchangeState {
    /// Terminal states absorb all further input.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Errored | Self::TimedOut | Self::Closed
        )
    }
}

/// What the driver should do with the connection after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// Normal completion; the finished assistant message.
    Completed(Message),
    /// An error notice was shown; partial answer text, if any, stays visible.
    Errored {
        message: String,
        partial: Option<String>,
    },
    /// The timeout fired before any answer text.
    TimedOut,
    /// The stream ended or timed out after content without a terminal event.
    Closed { partial: String },
}

/// Transient state of one request/response cycle.
#[derive(Debug)]
pub struct Exchange {
    state: ExchangeState,
    /// In-progress assistant message, filled in place as chunks arrive.
    answer: Message,
    error: Option<String>,
    has_content: bool,
    working: bool,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ExchangeState::Idle,
            answer: Message::assistant(String::new()),
            error: None,
            has_content: false,
            working: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Accumulated answer text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.answer.content
    }

    /// Whether any answer chunk has arrived.
    #[must_use]
    pub const fn has_content(&self) -> bool {
        self.has_content
    }

    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// Marks the request as sent: locks input and shows the working indicator.
    pub fn begin<V: ChatView + ?Sized>(&mut self, view: &mut V) {
        if self.state != ExchangeState::Idle {
            return;
        }
        self.state = ExchangeState::Sent;
        view.disable_input();
        view.show_working();
        self.working = true;
    }

    /// Applies one server event.
    pub fn on_event<V: ChatView + ?Sized>(&mut self, event: ServerEvent, view: &mut V) -> Flow {
        if self.is_terminated() {
            return Flow::Close;
        }
        match event {
            ServerEvent::AnswerChunk(chunk) => {
                if !self.has_content {
                    self.clear_working(view);
                    self.has_content = true;
                    self.state = ExchangeState::Streaming;
                }
                self.answer.append(&chunk);
                view.update_assistant(&self.answer.content);
                Flow::Continue
            }
            ServerEvent::MedicalWarning(text) => {
                view.show_warning(&text);
                Flow::Continue
            }
            ServerEvent::Sources(sources) => {
                self.clear_working(view);
                if !sources.is_empty() {
                    view.show_sources(&sources);
                }
                self.answer.sources = sources;
                self.terminate(ExchangeState::Completed, view);
                log::info!("Response completed ({} chars)", self.answer.content.len());
                Flow::Close
            }
            ServerEvent::Error(message) => {
                log::error!("Server reported error: {message}");
                self.fail(message, view);
                Flow::Close
            }
        }
    }

    /// The underlying connection failed or ended without a terminal event.
    ///
    /// Before any content this is a hard failure; after content has started
    /// it is treated as the server closing a finished stream.
    pub fn on_transport_closed<V: ChatView + ?Sized>(&mut self, view: &mut V) -> Flow {
        if self.is_terminated() {
            return Flow::Close;
        }
        if self.has_content() {
            log::info!("Connection closed after receiving response");
            self.terminate(ExchangeState::Closed, view);
        } else {
            self.fail(CONNECTION_ERROR.to_string(), view);
        }
        Flow::Close
    }

    /// The request could not be constructed or dispatched.
    pub fn on_send_failed<V: ChatView + ?Sized>(&mut self, view: &mut V) -> Flow {
        if self.is_terminated() {
            return Flow::Close;
        }
        self.fail(SEND_ERROR.to_string(), view);
        Flow::Close
    }

    /// The response timeout elapsed.
    ///
    /// Before any answer text this is a timeout error. After content has
    /// started the connection is closed quietly and the partial answer kept.
    pub fn on_timeout<V: ChatView + ?Sized>(&mut self, view: &mut V) -> Flow {
        if self.is_terminated() {
            return Flow::Close;
        }
        if self.has_content() {
            log::info!("Event stream timeout after partial response, closing connection");
            self.terminate(ExchangeState::Closed, view);
            return Flow::Close;
        }
        log::warn!("Event stream timeout, closing connection");
        self.clear_working(view);
        view.show_error(TIMEOUT_ERROR);
        self.terminate(ExchangeState::TimedOut, view);
        Flow::Close
    }

    /// Describes how the exchange ended, or `None` while it is still running.
    #[must_use]
    pub fn outcome(&self) -> Option<ExchangeOutcome> {
        let content = &self.answer.content;
        let partial = (!content.is_empty()).then(|| content.clone());
        match self.state {
            ExchangeState::Completed => Some(ExchangeOutcome::Completed(self.answer.clone())),
            ExchangeState::Errored => Some(ExchangeOutcome::Errored {
                message: self.error.clone().unwrap_or_default(),
                partial,
            }),
            ExchangeState::TimedOut => Some(ExchangeOutcome::TimedOut),
            ExchangeState::Closed => Some(ExchangeOutcome::Closed {
                partial: content.clone(),
            }),
            ExchangeState::Idle | ExchangeState::Sent | ExchangeState::Streaming => None,
        }
    }

    fn fail<V: ChatView + ?Sized>(&mut self, message: String, view: &mut V) {
        self.clear_working(view);
        view.show_error(&message);
        self.error = Some(message);
        self.terminate(ExchangeState::Errored, view);
    }

    fn clear_working<V: ChatView + ?Sized>(&mut self, view: &mut V) {
        if self.working {
            self.working = false;
            view.hide_working();
        }
    }

    fn terminate<V: ChatView + ?Sized>(&mut self, state: ExchangeState, view: &mut V) {
        self.state = state;
        view.enable_input();
    }
}
