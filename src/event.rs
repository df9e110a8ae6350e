//! Typed payloads carried by the chat event stream.

use serde::Deserialize;
use serde_json::Value;

use crate::message::Source;

/// An event delivered by the `/get` stream.
///
/// Each SSE `data:` payload is a JSON object `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A piece of the answer text, appended in arrival order.
    AnswerChunk(String),
    /// Citations for the answer; marks normal completion.
    Sources(Vec<Source>),
    /// Advisory banner shown alongside the answer.
    MedicalWarning(String),
    /// Server-side failure; terminates the exchange.
    Error(String),
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl ServerEvent {
    /// Parses one SSE data payload.
    ///
    /// Returns `Ok(None)` for well-formed events of an unknown type.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not JSON, has no `type`, or its
    /// `content` does not have the shape the type requires.
    pub fn parse(data: &str) -> serde_json::Result<Option<Self>> {
        let raw: RawEvent = serde_json::from_str(data)?;
        let event = match raw.kind.as_str() {
            "answer_chunk" => Self::AnswerChunk(serde_json::from_value(raw.content)?),
            "sources" => Self::Sources(serde_json::from_value(raw.content)?),
            "medical_warning" => Self::MedicalWarning(serde_json::from_value(raw.content)?),
            "error" => Self::Error(serde_json::from_value(raw.content)?),
            other => {
                log::debug!("Ignoring event of unknown type '{other}'");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}
