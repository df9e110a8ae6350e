//! Minimal text-to-markup transform for chat bubbles.
//!
//! User and server text is HTML-escaped first, then a small fixed set of
//! rules is applied: inline code, bold, italic, paragraph and line breaks.
//! Anything else passes through as escaped text.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").expect("valid regex"));

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Escapes the five HTML-significant characters.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Converts chat text into escaped HTML markup.
///
/// Rules, applied after escaping:
/// - `` `code` `` becomes `<code>code</code>`; its contents are not formatted further
/// - `**bold**` becomes `<strong>bold</strong>`
/// - `*italic*` becomes `<em>italic</em>`
/// - a blank line starts a new paragraph, a single newline becomes `<br>`
///
/// The result is wrapped in `<p>` elements. Empty input yields an empty string.
#[must_use]
pub fn to_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = text.replace("\r\n", "\n");
    let escaped = escape_html(&normalized);
    let inline = format_inline(&escaped);

    PARAGRAPH_RE
        .split(&inline)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>")))
        .collect()
}

/// Applies code spans first so emphasis markers inside them survive.
fn format_inline(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut last = 0;
    for caps in CODE_RE.captures_iter(escaped) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&format_emphasis(&escaped[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(&caps[1]);
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&format_emphasis(&escaped[last..]));
    out
}

fn format_emphasis(text: &str) -> String {
    let bold = BOLD_RE.replace_all(text, "<strong>$1</strong>");
    ITALIC_RE.replace_all(&bold, "<em>$1</em>").into_owned()
}

/// Formats a timestamp as `HH:MM` for message footers.
#[must_use]
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%H:%M").to_string()
}
