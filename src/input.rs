//! Message input validation and the live character counter.

use thiserror::Error;

/// Maximum message length accepted by the chat endpoint.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Reasons a message is rejected before any request is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a message")]
    Empty,

    #[error("Message too long. Please keep it under {max} characters.")]
    TooLong { len: usize, max: usize },
}

/// Trims `text` and checks it against the length limit.
///
/// Length is counted in characters, not bytes.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for blank input and
/// [`ValidationError::TooLong`] when the trimmed text exceeds `max`.
pub fn validate_message(text: &str, max: usize) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { len, max });
    }
    Ok(trimmed)
}

/// Severity of the character counter as the limit approaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterLevel {
    Normal,
    /// Above 80% of the limit.
    Warning,
    /// Above 90% of the limit.
    Error,
}

/// Snapshot of the input length relative to the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharCounter {
    pub len: usize,
    pub max: usize,
}

impl CharCounter {
    /// Measures `text` against `max`.
    #[must_use]
    pub fn measure(text: &str, max: usize) -> Self {
        Self {
            len: text.chars().count(),
            max,
        }
    }

    /// Returns the counter level.
    #[must_use]
    pub const fn level(&self) -> CounterLevel {
        // len * 10 > max * 9  <=>  len > 0.9 * max
        if self.len * 10 > self.max * 9 {
            CounterLevel::Error
        } else if self.len * 10 > self.max * 8 {
            CounterLevel::Warning
        } else {
            CounterLevel::Normal
        }
    }

    /// Whether the send action should be enabled.
    #[must_use]
    pub const fn can_send(&self) -> bool {
        self.len > 0 && self.len <= self.max
    }

    /// Counter text, e.g. `"42/1000"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.len, self.max)
    }
}
