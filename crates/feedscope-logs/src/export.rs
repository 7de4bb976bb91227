//! Rows handed to exporters
//!
//! Exporters see the raw store order, independent of filters and the
//! viewport, with the same gap rows the console would show.

use serde::Serialize;

use feedscope_types::{ArcLogEntry, LogEntry};

use crate::config::GapConfig;
use crate::error::Result;
use crate::gap;

/// One exported row
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportRow {
    Entry {
        time: String,
        label: String,
        severity: &'static str,
        message: String,
    },
    Gap {
        elapsed_seconds: f64,
    },
}

impl ExportRow {
    fn from_entry(entry: &LogEntry) -> Self {
        Self::Entry {
            time: entry.time_text(),
            label: entry.label().to_string(),
            severity: entry.severity.as_str(),
            message: entry.plain_message.clone(),
        }
    }

    /// Tab-separated text form
    pub fn to_line(&self) -> String {
        match self {
            Self::Entry {
                time,
                label,
                message,
                ..
            } => format!("{}\t{}\t{}", time, label, message),
            Self::Gap { elapsed_seconds } => format!("--- {:.2}s ---", elapsed_seconds),
        }
    }
}

/// Entries in store order, with gap rows when `gaps.export` is set
pub fn export_rows(entries: &[ArcLogEntry], gaps: &GapConfig) -> Vec<ExportRow> {
    let mut rows = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        if gaps.export && i > 0 {
            if let Some(marker) = gap::gap_between(&entries[i - 1], entry, gaps.threshold) {
                rows.push(ExportRow::Gap {
                    elapsed_seconds: marker.elapsed_seconds,
                });
            }
        }
        rows.push(ExportRow::from_entry(entry));
    }

    rows
}

/// One JSON object per row, newline separated
pub fn export_json_lines(rows: &[ExportRow]) -> Result<String> {
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}
