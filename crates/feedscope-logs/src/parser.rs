use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use feedscope_types::Severity;

use crate::record::LogRecord;

/// Turns raw text lines into log records
///
/// Wall-clock timestamps are converted to seconds relative to the first
/// one seen, so a parser should live as long as the session it feeds.
#[derive(Clone, Debug, Default)]
pub struct LogParser {
    epoch: Option<DateTime<Utc>>,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one line; blank lines yield nothing
    pub fn parse(&mut self, raw: &str) -> Option<LogRecord> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if raw.trim().is_empty() {
            return None;
        }

        if let Some(fields) = Self::try_parse_json(raw) {
            return Some(self.record_from_json(&fields, raw));
        }

        let (timestamp, content) = Self::extract_timestamp(raw);
        let mut record =
            LogRecord::new(content).severity(Self::extract_severity_from_text(content));
        if let Some(ts) = timestamp {
            record = record.at(self.relative_seconds(ts));
        }
        Some(record)
    }

    /// Seconds since the first wall-clock timestamp of the session
    fn relative_seconds(&mut self, ts: DateTime<Utc>) -> f64 {
        let epoch = *self.epoch.get_or_insert(ts);
        let elapsed = ts.signed_duration_since(epoch);
        elapsed.num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
    }

    /// Extract an RFC 3339 timestamp from the beginning of a line
    fn extract_timestamp(raw: &str) -> (Option<DateTime<Utc>>, &str) {
        let end = raw.find(char::is_whitespace).unwrap_or(raw.len());
        match DateTime::parse_from_rfc3339(&raw[..end]) {
            Ok(ts) => (Some(ts.with_timezone(&Utc)), raw[end..].trim_start()),
            Err(_) => (None, raw),
        }
    }

    /// Try to parse the line as a JSON object
    fn try_parse_json(content: &str) -> Option<Map<String, Value>> {
        let trimmed = content.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        match serde_json::from_str(trimmed) {
            Ok(Value::Object(fields)) => Some(fields),
            _ => None,
        }
    }

    fn record_from_json(&mut self, fields: &Map<String, Value>, raw: &str) -> LogRecord {
        let message = Self::string_field(fields, &["message", "msg", "text"])
            .unwrap_or_else(|| raw.trim().to_string());

        let mut record = LogRecord::new(message)
            .severity(Self::extract_severity_from_json(fields));

        if let Some(layer) = Self::string_field(fields, &["layer"]) {
            record = record.layer(layer);
        }
        if let Some(tag) = Self::string_field(fields, &["tag"]) {
            record = record.tag(tag);
        }
        if let Some(stack) = Self::string_field(fields, &["stack"]) {
            record = record.stack(stack);
        }
        if let Some(prefix) = Self::string_field(fields, &["prefix"]) {
            record = record.prefix(prefix);
        }
        if let Some(color) = Self::string_field(fields, &["color"]) {
            record = record.colored(&color);
        }

        for key in ["time", "timestamp"] {
            match fields.get(key) {
                Some(Value::Number(n)) => {
                    if let Some(seconds) = n.as_f64() {
                        record = record.at(seconds);
                        break;
                    }
                }
                Some(Value::String(s)) => {
                    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                        record = record.at(self.relative_seconds(ts.with_timezone(&Utc)));
                        break;
                    }
                }
                _ => {}
            }
        }

        record
    }

    fn string_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match fields.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }

    /// Extract severity from JSON fields
    fn extract_severity_from_json(fields: &Map<String, Value>) -> Severity {
        for field in ["level", "severity", "lvl", "Level"] {
            match fields.get(field) {
                Some(Value::String(s)) => return Severity::from_str(s),
                // bunyan/pino numeric levels
                Some(Value::Number(n)) => {
                    if let Some(num) = n.as_u64() {
                        return match num {
                            0..=20 => Severity::Unimportant,
                            21..=30 => Severity::Info,
                            31..=40 => Severity::Warning,
                            _ => Severity::Error,
                        };
                    }
                }
                _ => {}
            }
        }
        Severity::Info
    }

    /// Extract severity from plain text patterns
    fn extract_severity_from_text(content: &str) -> Severity {
        let upper = content.to_uppercase();

        let bracket_patterns = [
            ("[FATAL]", Severity::Error),
            ("[ERROR]", Severity::Error),
            ("[ERR]", Severity::Error),
            ("[WARN]", Severity::Warning),
            ("[WARNING]", Severity::Warning),
            ("[DEBUG]", Severity::Unimportant),
            ("[TRACE]", Severity::Unimportant),
        ];
        for (pattern, severity) in bracket_patterns {
            if upper.contains(pattern) {
                return severity;
            }
        }

        let start_patterns = [
            ("FATAL", Severity::Error),
            ("ERROR", Severity::Error),
            ("WARN", Severity::Warning),
            ("DEBUG", Severity::Unimportant),
            ("TRACE", Severity::Unimportant),
        ];
        for (pattern, severity) in start_patterns {
            if upper.trim_start().starts_with(pattern) {
                return severity;
            }
        }

        Severity::Info
    }
}
