//! Rendering seam between the chat session and whatever displays it.

use crate::message::{Message, Source};

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

/// Receives rendering commands from a [`ChatSession`](crate::ChatSession).
///
/// All methods have default no-op implementations so a view only needs to
/// implement what it actually displays.
pub trait ChatView: Send {
    /// A finished message to append to the conversation (user input, welcome text).
    fn show_message(&mut self, _message: &Message) {}

    /// Show the "working" indicator while waiting for the first chunk.
    fn show_working(&mut self) {}

    /// Remove the "working" indicator.
    fn hide_working(&mut self) {}

    /// The in-progress assistant message changed; `content` is the full text so far.
    fn update_assistant(&mut self, _content: &str) {}

    /// Citations for the current assistant message. Called at most once per exchange.
    fn show_sources(&mut self, _sources: &[Source]) {}

    /// An advisory banner from the server.
    fn show_warning(&mut self, _text: &str) {}

    /// An error notice embedded in the conversation.
    fn show_error(&mut self, _text: &str) {}

    /// Lock the input while an exchange is in flight.
    fn disable_input(&mut self) {}

    /// Unlock the input once the exchange terminates.
    fn enable_input(&mut self) {}

    /// A transient notice outside the conversation.
    fn toast(&mut self, _level: ToastLevel, _text: &str) {}
}

/// A view that ignores all rendering commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoView;

impl ChatView for NoView {}

/// One rendering command, as captured by [`RecordingView`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Message(Message),
    WorkingShown,
    WorkingHidden,
    AssistantUpdated(String),
    Sources(Vec<Source>),
    Warning(String),
    Error(String),
    InputDisabled,
    InputEnabled,
    Toast(ToastLevel, String),
}

/// A view that records every command in order.
///
/// Useful for headless embedding and for asserting rendering behavior.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
}

impl RecordingView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&ViewEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// Latest assistant text, if any chunk was rendered.
    #[must_use]
    pub fn assistant_text(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            ViewEvent::AssistantUpdated(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// All error notices, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Error(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether the input is currently enabled, judged by the last toggle.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.events
            .iter()
            .rev()
            .find_map(|e| match e {
                ViewEvent::InputEnabled => Some(true),
                ViewEvent::InputDisabled => Some(false),
                _ => None,
            })
            .unwrap_or(true)
    }

    /// Clears the recording.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl ChatView for RecordingView {
    fn show_message(&mut self, message: &Message) {
        self.events.push(ViewEvent::Message(message.clone()));
    }

    fn show_working(&mut self) {
        self.events.push(ViewEvent::WorkingShown);
    }

    fn hide_working(&mut self) {
        self.events.push(ViewEvent::WorkingHidden);
    }

    fn update_assistant(&mut self, content: &str) {
        self.events.push(ViewEvent::AssistantUpdated(content.to_string()));
    }

    fn show_sources(&mut self, sources: &[Source]) {
        self.events.push(ViewEvent::Sources(sources.to_vec()));
    }

    fn show_warning(&mut self, text: &str) {
        self.events.push(ViewEvent::Warning(text.to_string()));
    }

    fn show_error(&mut self, text: &str) {
        self.events.push(ViewEvent::Error(text.to_string()));
    }

    fn disable_input(&mut self) {
        self.events.push(ViewEvent::InputDisabled);
    }

    fn enable_input(&mut self) {
        self.events.push(ViewEvent::InputEnabled);
    }

    fn toast(&mut self, level: ToastLevel, text: &str) {
        self.events.push(ViewEvent::Toast(level, text.to_string()));
    }
}
