//! Conversation messages and source citations.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Display name used when a source object carries no name.
pub const UNKNOWN_SOURCE_NAME: &str = "Unknown Source";

/// Display name used when a path-like source has no final segment.
pub const FALLBACK_REFERENCE_NAME: &str = "Medical Reference";

/// Credibility assumed when the server does not provide one.
pub const DEFAULT_CREDIBILITY: f64 = 0.7;

/// Icon used when a source carries none.
pub const DEFAULT_SOURCE_ICON: &str = "📚";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Message {
    /// Creates a user message stamped with the current time.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message stamped with the current time.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
            sources: Vec::new(),
        }
    }

    /// Appends streamed text to the message body.
    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    /// Returns true if this message was written by the user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Coarse credibility bucket used to pick a display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredibilityTier {
    High,
    Medium,
    Low,
}

/// A citation attached to an assistant answer.
///
/// Deserializes from either an object (`{"name", "credibility", "icon"}`,
/// every field optional) or a bare string, which is treated as a file path
/// whose final segment becomes the display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSource")]
pub struct Source {
    pub name: String,
    pub credibility: f64,
    pub icon: String,
}

impl Source {
    /// Creates a source, clamping credibility into `[0, 1]`.
    #[must_use]
    pub fn new(name: impl Into<String>, credibility: f64, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credibility: normalize_credibility(Some(credibility)),
            icon: icon.into(),
        }
    }

    /// Builds a source from a file path, keeping only its final segment.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(FALLBACK_REFERENCE_NAME);
        Self {
            name: name.to_string(),
            credibility: DEFAULT_CREDIBILITY,
            icon: DEFAULT_SOURCE_ICON.to_string(),
        }
    }

    /// Credibility as a whole percentage.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn credibility_percent(&self) -> u8 {
        (self.credibility * 100.0).round() as u8
    }

    /// Classifies the credibility score.
    #[must_use]
    pub fn tier(&self) -> CredibilityTier {
        if self.credibility >= 0.8 {
            CredibilityTier::High
        } else if self.credibility >= 0.6 {
            CredibilityTier::Medium
        } else {
            CredibilityTier::Low
        }
    }
}

fn normalize_credibility(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => DEFAULT_CREDIBILITY,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Path(String),
    Object {
        name: Option<String>,
        credibility: Option<f64>,
        icon: Option<String>,
    },
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        match raw {
            RawSource::Path(path) => Self::from_path(&path),
            RawSource::Object {
                name,
                credibility,
                icon,
            } => Self {
                name: name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| UNKNOWN_SOURCE_NAME.to_string()),
                credibility: normalize_credibility(credibility),
                icon: icon
                    .filter(|i| !i.is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE_ICON.to_string()),
            },
        }
    }
}
