//! Shared types for feedscope
//!
//! This crate contains data structures used across multiple feedscope crates.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use unicode_width::UnicodeWidthStr;

// ============================================================================
// Severity and Layers
// ============================================================================

/// Log severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Severity {
    Unimportant,
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Parse severity from common level spellings
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "unimportant" | "trace" | "trc" | "debug" | "dbg" | "verbose" => Self::Unimportant,
            "warn" | "warning" | "wrn" => Self::Warning,
            "error" | "err" | "fatal" | "panic" | "critical" | "crit" | "exception"
            | "assert" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Default text colour for messages of this severity
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Unimportant => "#ababab",
            Self::Info => "#ffffff",
            Self::Warning => "#fceba8",
            Self::Error => "#cc6666",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unimportant => "Unimportant",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

/// Name of the layer used when a message does not name one
pub const UNDEFINED_LAYER: &str = "Undefined";

/// A named layer with its display colour
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub hex: String,
}

impl Layer {
    pub fn new(name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hex: hex.into(),
        }
    }

    pub fn undefined() -> Self {
        Self::new(UNDEFINED_LAYER, "#FFFFFF")
    }
}

// ============================================================================
// Markup
// ============================================================================

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("<.*?>").expect("markup pattern is a valid regex"));

/// Remove every `<...>` rich-text tag from a message
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

/// Wrap text in a colour tag
pub fn color_text(hex: &str, text: &str) -> String {
    format!("<color={}>{}</color>", hex, text)
}

// ============================================================================
// Log Entries
// ============================================================================

/// A single log entry
///
/// Entries are immutable once they enter the store and are shared as
/// [`ArcLogEntry`] between the store, the projection and the search cache.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    /// Insertion-order ID, assigned by the store
    pub id: u64,

    /// Message as logged, possibly containing markup
    pub message: String,

    /// Message with markup removed (what search operates on)
    pub plain_message: String,

    /// Layer the message was logged on
    pub layer: String,

    /// Prefix shown instead of the layer name
    pub prefix: Option<String>,

    /// Optional tag used for hiding specific entries
    pub tag: Option<String>,

    pub severity: Severity,

    /// Seconds since the session started
    pub timestamp: f64,

    /// Raw stack trace text
    pub stack: String,
}

impl LogEntry {
    /// Create a new entry with minimal fields
    pub fn new(message: impl Into<String>, layer: impl Into<String>, timestamp: f64) -> Self {
        let message = message.into();
        Self {
            id: 0,
            plain_message: strip_markup(&message),
            message,
            layer: layer.into(),
            prefix: None,
            tag: None,
            severity: Severity::Info,
            timestamp,
            stack: String::new(),
        }
    }

    /// Text for the layer column: the custom prefix, else the layer name
    pub fn label(&self) -> &str {
        self.prefix.as_deref().unwrap_or(&self.layer)
    }

    /// Timestamp formatted as `h:mm:ss.ff`
    pub fn time_text(&self) -> String {
        let hundredths = (self.timestamp.max(0.0) * 100.0).floor() as u64;
        let hours = (hundredths / 360_000) % 24;
        let minutes = (hundredths / 6_000) % 60;
        let seconds = (hundredths / 100) % 60;
        format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, hundredths % 100)
    }
}

pub type ArcLogEntry = Arc<LogEntry>;

// ============================================================================
// Projection Rows
// ============================================================================

/// A maximal run of consecutive entries hidden by the current filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HiddenRunGroup {
    /// ID of the first hidden entry; identifies the group across rebuilds
    pub first_entry_id: u64,
    /// Number of hidden entries in the run (always at least 1)
    pub count: usize,
    pub expanded: bool,
}

/// Synthetic "time elapsed" marker between two visible entries
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GapMarker {
    pub after_entry_id: u64,
    /// Elapsed seconds, floored to hundredths
    pub elapsed_seconds: f64,
}

/// One row of the visible projection
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Row {
    Entry(ArcLogEntry),
    GroupStart(HiddenRunGroup),
    /// Closes an expanded group; carries the group's first entry ID
    GroupEnd(u64),
    Gap(GapMarker),
}

impl Row {
    /// The entry behind this row, if it is a real entry
    pub fn entry(&self) -> Option<&ArcLogEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Entry(_))
    }
}

// ============================================================================
// Search Highlights
// ============================================================================

/// Location of the first query occurrence inside an entry's plain message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HighlightSpan {
    /// Byte offset into `plain_message`
    pub start: usize,
    /// Byte length of the matched text
    pub len: usize,
}

impl HighlightSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Terminal column where the highlight starts
    pub fn column(&self, text: &str) -> usize {
        text.get(..self.start).map(|s| s.width()).unwrap_or(0)
    }

    /// Terminal width of the highlighted text
    pub fn width(&self, text: &str) -> usize {
        text.get(self.start..self.end()).map(|s| s.width()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<color=#fff>hello</color> <b>world</b>"), "hello world");
        assert_eq!(strip_markup("a < b"), "a < b");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn test_entry_plain_message() {
        let entry = LogEntry::new(color_text("#cc6666", "boom"), "Net", 1.0);
        assert_eq!(entry.message, "<color=#cc6666>boom</color>");
        assert_eq!(entry.plain_message, "boom");
    }

    #[test]
    fn test_label_prefers_prefix() {
        let mut entry = LogEntry::new("msg", "Physics", 0.0);
        assert_eq!(entry.label(), "Physics");
        entry.prefix = Some("Warning".to_string());
        assert_eq!(entry.label(), "Warning");
    }

    #[test]
    fn test_time_text() {
        assert_eq!(LogEntry::new("", "", 0.0).time_text(), "0:00:00.00");
        assert_eq!(LogEntry::new("", "", 3.456).time_text(), "0:00:03.45");
        assert_eq!(LogEntry::new("", "", 3725.5).time_text(), "1:02:05.50");
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("WARN"), Severity::Warning);
        assert_eq!(Severity::from_str("debug"), Severity::Unimportant);
        assert_eq!(Severity::from_str("Exception"), Severity::Error);
        assert_eq!(Severity::from_str("whatever"), Severity::Info);
    }

    #[test]
    fn test_highlight_columns() {
        let text = "日本 error";
        let span = HighlightSpan { start: text.find("error").unwrap(), len: 5 };
        assert_eq!(span.column(text), 5);
        assert_eq!(span.width(text), 5);
    }
}
