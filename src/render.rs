//! Plain-text and JSON output of the console view

use std::io::{self, Write};

use serde::Serialize;

use feedscope_logs::{HighlightSpan, LogConsole, LogEntry, Row, VisibleRange};

/// Width of the label column
const LABEL_WIDTH: usize = 12;

const HIGHLIGHT_ON: &str = "\x1b[7m";
const HIGHLIGHT_OFF: &str = "\x1b[0m";

/// Print the rows inside the render range followed by a status line
///
/// With `ansi` set, search hits are shown in reverse video.
pub fn write_text<W: Write>(out: &mut W, console: &mut LogConsole, ansi: bool) -> io::Result<()> {
    let rows = console.visible_rows().to_vec();
    let selected = console.selected_entry().map(|e| e.id);

    for row in &rows {
        match row {
            Row::Entry(entry) => {
                let marker = if Some(entry.id) == selected { '>' } else { ' ' };
                let message = match console.highlight(entry.id) {
                    Some(span) if ansi => highlighted(entry, span.start, span.end()),
                    _ => entry.plain_message.clone(),
                };
                writeln!(
                    out,
                    "{} {} {:>width$} | {}",
                    marker,
                    entry.time_text(),
                    entry.label(),
                    message,
                    width = LABEL_WIDTH
                )?;
            }
            Row::GroupStart(group) => {
                let sign = if group.expanded { '-' } else { '+' };
                writeln!(
                    out,
                    "  [{}] {} hidden entries (group {})",
                    sign, group.count, group.first_entry_id
                )?;
            }
            Row::GroupEnd(_) => writeln!(out, "  [-] end of hidden entries")?,
            Row::Gap(gap) => writeln!(out, "  --- {:.2}s ---", gap.elapsed_seconds)?,
        }
    }

    writeln!(out, "{}", status_line(console))
}

fn highlighted(entry: &LogEntry, start: usize, end: usize) -> String {
    let text = &entry.plain_message;
    match (text.get(..start), text.get(start..end), text.get(end..)) {
        (Some(before), Some(hit), Some(after)) => {
            format!("{}{}{}{}{}", before, HIGHLIGHT_ON, hit, HIGHLIGHT_OFF, after)
        }
        _ => text.clone(),
    }
}

fn status_line(console: &LogConsole) -> String {
    let total = console.rows().len();
    let range = match console.window() {
        VisibleRange::Empty => "empty".to_string(),
        VisibleRange::Rows { first, last } => format!("rows {}-{} of {}", first + 1, last + 1, total),
    };
    let mut status = format!("-- {} | {}", console.title(), range);
    if !console.search_query().is_empty() {
        status.push_str(&format!(" | search: {}", console.search_status()));
    }
    status
}

#[derive(Serialize)]
struct JsonRow<'a> {
    index: usize,
    row: &'a Row,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight: Option<JsonHighlight>,
}

/// A search hit with byte offsets plus terminal columns for the consumer
#[derive(Serialize)]
struct JsonHighlight {
    start: usize,
    len: usize,
    column: usize,
    width: usize,
}

impl JsonHighlight {
    fn new(entry: &LogEntry, span: HighlightSpan) -> Self {
        Self {
            start: span.start,
            len: span.len,
            column: span.column(&entry.plain_message),
            width: span.width(&entry.plain_message),
        }
    }
}

/// Print the rows inside the render range as JSON lines
pub fn write_json<W: Write>(out: &mut W, console: &mut LogConsole) -> io::Result<()> {
    let start = console.window().as_range().start;
    let rows = console.visible_rows().to_vec();

    for (offset, row) in rows.iter().enumerate() {
        let highlight = row
            .entry()
            .and_then(|e| console.highlight(e.id).map(|span| JsonHighlight::new(e, span)));
        let line = serde_json::to_string(&JsonRow {
            index: start + offset,
            row,
            highlight,
        })
        .map_err(io::Error::other)?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedscope_logs::{ConsoleConfig, LogRecord};

    fn console() -> LogConsole {
        let mut console = LogConsole::new("app.log", ConsoleConfig::default());
        console.set_viewport_height(10.0 * 22.0);
        console.append(LogRecord::new("boot").layer("Core").at(0.0));
        console.append(LogRecord::new("noise").layer("Net").at(0.5));
        console.append(LogRecord::new("disk error").layer("Core").at(4.0));
        console.set_layer_visible("Net", false);
        console.rebuild();
        console
    }

    fn text(console: &mut LogConsole, ansi: bool) -> String {
        let mut out = Vec::new();
        write_text(&mut out, console, ansi).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_rows() {
        let mut console = console();
        let output = text(&mut console, false);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("Core | boot"));
        assert_eq!(lines[1], "  [+] 1 hidden entries (group 1)");
        assert!(lines[2].ends_with("Core | disk error"));
        assert_eq!(lines[3], "-- app.log (3) | rows 1-3 of 3");
    }

    #[test]
    fn test_search_hit_highlighted() {
        let mut console = console();
        console.set_query("error");
        let output = text(&mut console, true);
        assert!(output.contains("> 0:00:04.00"));
        assert!(output.contains("disk \x1b[7merror\x1b[0m"));
        assert!(output.ends_with("| search: 1/1\n"));
    }

    #[test]
    fn test_json_rows() {
        let mut console = console();
        let mut out = Vec::new();
        write_json(&mut out, &mut console).unwrap();
        let output = String::from_utf8(out).unwrap();
        let first: serde_json::Value = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(first["index"], 0);
        assert_eq!(first["row"]["Entry"]["message"], "boot");
    }

    #[test]
    fn test_json_highlight_columns() {
        let mut console = LogConsole::new("app.log", ConsoleConfig::default());
        console.set_viewport_height(10.0 * 22.0);
        console.append(LogRecord::new("日本 error").at(0.0));
        console.rebuild();
        console.set_query("error");

        let mut out = Vec::new();
        write_json(&mut out, &mut console).unwrap();
        let output = String::from_utf8(out).unwrap();
        let row: serde_json::Value = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(row["highlight"]["start"], 7);
        assert_eq!(row["highlight"]["len"], 5);
        assert_eq!(row["highlight"]["column"], 5);
        assert_eq!(row["highlight"]["width"], 5);
    }
}
