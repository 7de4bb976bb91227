use feedscope_types::{GapMarker, LogEntry, Row};

/// Seconds between two entries, floored to hundredths
pub fn elapsed_between(first: &LogEntry, second: &LogEntry) -> f64 {
    ((second.timestamp - first.timestamp) * 100.0).floor() / 100.0
}

/// The gap marker between two entries, if the pause reaches the threshold
pub fn gap_between(first: &LogEntry, second: &LogEntry, threshold: f64) -> Option<GapMarker> {
    let elapsed = elapsed_between(first, second);
    (elapsed >= threshold).then_some(GapMarker {
        after_entry_id: first.id,
        elapsed_seconds: elapsed,
    })
}

/// Insert gap markers between adjacent real entries
///
/// Only directly adjacent entry rows are compared; a group marker between
/// two entries suppresses the gap.
pub fn annotate(rows: Vec<Row>, threshold: f64) -> Vec<Row> {
    let mut out = Vec::with_capacity(rows.len());
    let mut iter = rows.into_iter().peekable();

    while let Some(row) = iter.next() {
        let gap = match (&row, iter.peek()) {
            (Row::Entry(first), Some(Row::Entry(second))) => gap_between(first, second, threshold),
            _ => None,
        };
        out.push(row);
        if let Some(gap) = gap {
            out.push(Row::Gap(gap));
        }
    }

    out
}
