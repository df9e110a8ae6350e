//! Incremental decoder for `text/event-stream` bodies.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Last seen `id:` value.
    pub id: Option<String>,
}

impl SseFrame {
    /// Creates an unnamed frame carrying `data`.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// True for frames a browser `EventSource` delivers to `onmessage`.
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.event.as_deref().is_none_or(|e| e.is_empty() || e == "message")
    }
}

/// Longest line accepted by default, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Line-oriented SSE decoder for use with [`tokio_util::codec::FramedRead`].
///
/// Accepts `\n`, `\r\n` and `\r` line endings. Lines are only decoded once
/// complete, so multi-byte characters split across reads are reassembled.
/// A line longer than the configured maximum is an `InvalidData` error.
#[derive(Debug)]
pub struct SseCodec {
    event: Option<String>,
    data: Option<String>,
    last_id: Option<String>,
    seen_first_line: bool,
    max_line_bytes: usize,
}

impl Default for SseCodec {
    fn default() -> Self {
        Self {
            event: None,
            data: None,
            last_id: None,
            seen_first_line: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl SseCodec {
    /// Creates a decoder with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the longest accepted line, in bytes.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    fn line_too_long(&self, len: usize) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "event stream line of {len} bytes exceeds limit of {}",
                self.max_line_bytes
            ),
        )
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseFrame> {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.seen_first_line {
            self.seen_first_line = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = self.data.take()?;
        Some(SseFrame {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Finds the end of the first complete line: `(line_len, terminator_len)`.
///
/// A trailing `\r` at the end of the buffer is ambiguous (it may be the
/// first half of `\r\n`) and is treated as incomplete.
fn find_line_end(buf: &[u8]) -> Option<(usize, usize)> {
    let pos = buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
    if buf[pos] == b'\n' {
        return Some((pos, 1));
    }
    match buf.get(pos + 1) {
        Some(b'\n') => Some((pos, 2)),
        Some(_) => Some((pos, 1)),
        None => None,
    }
}

impl Decoder for SseCodec {
    type Item = SseFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<SseFrame>, Self::Error> {
        while let Some((line_len, terminator_len)) = find_line_end(src) {
            if line_len > self.max_line_bytes {
                return Err(self.line_too_long(line_len));
            }
            let line = src.split_to(line_len);
            src.advance(terminator_len);
            if let Some(frame) = self.process_line(&line) {
                return Ok(Some(frame));
            }
        }
        // what remains is one incomplete line, possibly ending in a lone '\r'
        let pending = src.len() - usize::from(src.last() == Some(&b'\r'));
        if pending > self.max_line_bytes {
            return Err(self.line_too_long(pending));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<SseFrame>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.last() == Some(&b'\r') {
            let line = src.split_to(src.len() - 1);
            src.clear();
            if let Some(frame) = self.process_line(&line) {
                return Ok(Some(frame));
            }
        }
        // An unterminated frame at end of stream is discarded.
        src.clear();
        self.event = None;
        self.data = None;
        Ok(None)
    }
}
