//! Log processing for feedscope
//!
//! This crate provides the log store, the filter/group/gap/search pipeline
//! that turns it into a visible projection, viewport windowing, parsing and
//! streaming.

mod buffer;
mod config;
mod console;
mod error;
mod export;
mod filter;
mod gap;
mod group;
mod parser;
mod record;
mod search;
mod stack;
mod stream;
mod viewport;

pub use buffer::{LogBuffer, Snapshot};
pub use config::{ConsoleConfig, GapConfig, LayerConfig};
pub use console::{LogConsole, RebuildStage};
pub use error::{Error, Result};
pub use export::{ExportRow, export_json_lines, export_rows};
pub use filter::VisibilityFilter;
pub use gap::{annotate as annotate_gaps, elapsed_between, gap_between};
pub use group::HiddenRunGrouper;
pub use parser::LogParser;
pub use record::{HostLogKind, LogRecord};
pub use search::{SearchEngine, SearchMatch, reanchor};
pub use stack::{SourceLocation, StackFrame, parse_stack};
pub use stream::{LogSource, LogStreamManager};
pub use viewport::{Viewport, VisibleRange, visible_range};

// Re-export types used in our public API
pub use feedscope_types::{
    ArcLogEntry, GapMarker, HiddenRunGroup, HighlightSpan, Layer, LogEntry, Row, Severity,
};
