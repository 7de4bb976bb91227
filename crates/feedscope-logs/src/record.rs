use feedscope_types::{LogEntry, Severity, UNDEFINED_LAYER, color_text};

/// A log message on its way into the store
///
/// Records carry everything an entry needs except the ID, which the store
/// assigns, and optionally the timestamp, which the store's session clock
/// fills in when absent.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub message: String,
    pub layer: String,
    pub tag: Option<String>,
    pub severity: Severity,
    pub timestamp: Option<f64>,
    pub stack: String,
    pub prefix: Option<String>,
}

impl LogRecord {
    /// A message on the undefined layer
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            layer: UNDEFINED_LAYER.to_string(),
            tag: None,
            severity: Severity::Info,
            timestamp: None,
            stack: String::new(),
            prefix: None,
        }
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Wrap the message in a colour tag
    pub fn colored(mut self, hex: &str) -> Self {
        self.message = color_text(hex, &self.message);
        self
    }

    /// Wrap the message in its severity's default colour
    pub fn severity_colored(self) -> Self {
        let hex = self.severity.hex();
        self.colored(hex)
    }

    /// Adapt a message from the host runtime's own logger
    ///
    /// Plain informational host messages are not mirrored into the console.
    pub fn from_host(message: &str, stack: &str, kind: HostLogKind) -> Option<Self> {
        let severity = match kind {
            HostLogKind::Log => return None,
            HostLogKind::Warning => Severity::Warning,
            HostLogKind::Error | HostLogKind::Assert | HostLogKind::Exception => Severity::Error,
        };

        Some(
            Self::new(message)
                .severity(severity)
                .tag(severity.as_str())
                .prefix(severity.as_str())
                .stack(stack),
        )
    }

    /// Build the stored entry
    pub(crate) fn into_entry(self, id: u64, timestamp: f64) -> LogEntry {
        let mut entry = LogEntry::new(self.message, self.layer, timestamp);
        entry.id = id;
        entry.tag = self.tag;
        entry.severity = self.severity;
        entry.stack = self.stack;
        entry.prefix = self.prefix;
        entry
    }
}

/// Message kinds reported by a host runtime logger
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostLogKind {
    Log,
    Warning,
    Error,
    Assert,
    Exception,
}
