//! Incremental substring search over the visible projection.
//!
//! Matches are recomputed whenever the query, the case mode or the
//! projection version changes. After every recompute the cursor is
//! re-anchored to the match closest in log order to the previously focused
//! entry, so the focus does not jump when unrelated entries arrive.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use feedscope_types::{ArcLogEntry, HighlightSpan, Row};

/// Plain substring matcher
#[derive(Clone, Debug)]
enum Matcher {
    Empty,
    Exact(String),
    IgnoreCase(Regex),
}

impl Matcher {
    fn new(query: &str, case_sensitive: bool) -> Self {
        if query.is_empty() {
            return Self::Empty;
        }
        if case_sensitive {
            return Self::Exact(query.to_string());
        }
        match RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => Self::IgnoreCase(re),
            Err(e) => {
                tracing::warn!("Search query rejected: {}", e);
                Self::Empty
            }
        }
    }

    /// First occurrence of the query in `text`
    fn find(&self, text: &str) -> Option<HighlightSpan> {
        match self {
            Self::Empty => None,
            Self::Exact(query) => text.find(query.as_str()).map(|start| HighlightSpan {
                start,
                len: query.len(),
            }),
            // Span covers the matched text; folding can change its byte length
            Self::IgnoreCase(re) => re.find(text).map(|m| HighlightSpan {
                start: m.start(),
                len: m.len(),
            }),
        }
    }
}

/// A matched entry and its position in the projection
#[derive(Clone, Debug)]
pub struct SearchMatch {
    pub position: usize,
    pub entry: ArcLogEntry,
}

/// Search state: query, matches, cursor and highlight cache
#[derive(Clone, Debug)]
pub struct SearchEngine {
    query: String,
    case_sensitive: bool,
    matcher: Matcher,

    matches: Vec<SearchMatch>,
    cursor: usize,

    /// Query or case mode changed since the last recompute
    dirty: bool,

    /// Projection version the matches were computed against
    projection_version: Option<u64>,

    /// Bumped on every recompute
    generation: u64,

    highlights: HashMap<u64, HighlightSpan>,
    highlights_generation: Option<u64>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            case_sensitive: false,
            matcher: Matcher::Empty,
            matches: Vec::new(),
            cursor: 0,
            dirty: false,
            projection_version: None,
            generation: 0,
            highlights: HashMap::new(),
            highlights_generation: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Change the query; returns true if it differs from the current one
    pub fn set_query(&mut self, query: &str) -> bool {
        if self.query == query {
            return false;
        }
        self.query = query.to_string();
        self.matcher = Matcher::new(&self.query, self.case_sensitive);
        self.dirty = true;
        true
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) -> bool {
        if self.case_sensitive == case_sensitive {
            return false;
        }
        self.case_sensitive = case_sensitive;
        self.matcher = Matcher::new(&self.query, self.case_sensitive);
        self.dirty = true;
        true
    }

    pub fn toggle_case_sensitive(&mut self) {
        self.set_case_sensitive(!self.case_sensitive);
    }

    /// Whether cached matches point past the end of a projection of `len` rows
    pub fn is_stale(&self, len: usize) -> bool {
        match self.matches.last() {
            Some(last) => self.matches.len() > len || last.position >= len,
            None => false,
        }
    }

    /// Bring matches up to date with the projection
    ///
    /// Returns true if the matches were recomputed.
    pub fn refresh(&mut self, rows: &[Row], version: u64) -> bool {
        let stale = self.is_stale(rows.len());
        if stale {
            tracing::debug!(
                matches = self.matches.len(),
                rows = rows.len(),
                "Search cache stale, recomputing"
            );
        }
        if !self.dirty && !stale && self.projection_version == Some(version) {
            return false;
        }

        self.recompute(rows);
        self.projection_version = Some(version);
        self.dirty = false;
        true
    }

    fn recompute(&mut self, rows: &[Row]) {
        let anchor = self.focused_entry().map(|e| e.id).unwrap_or(0);

        self.matches = rows
            .iter()
            .enumerate()
            .filter_map(|(position, row)| {
                let entry = row.entry()?;
                self.matcher.find(&entry.plain_message)?;
                Some(SearchMatch {
                    position,
                    entry: entry.clone(),
                })
            })
            .collect();

        let ids: Vec<u64> = self.matches.iter().map(|m| m.entry.id).collect();
        self.cursor = reanchor(&ids, anchor);
        self.generation += 1;

        tracing::debug!(
            query = %self.query,
            matches = self.matches.len(),
            cursor = self.cursor,
            "Search matches recomputed"
        );
    }

    /// Projection positions of every match, in order
    pub fn match_positions(&self) -> Vec<usize> {
        self.matches.iter().map(|m| m.position).collect()
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Cursor into the match list (0 when there are no matches)
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Projection position of the focused match
    pub fn focused(&self) -> Option<usize> {
        self.matches.get(self.cursor).map(|m| m.position)
    }

    pub fn focused_entry(&self) -> Option<&ArcLogEntry> {
        self.matches.get(self.cursor).map(|m| &m.entry)
    }

    /// Move to the next match, wrapping around
    pub fn next(&mut self) {
        self.step(1);
    }

    /// Move to the previous match, wrapping around
    pub fn previous(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, direction: isize) {
        let count = self.matches.len();
        if count == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + direction).rem_euclid(count as isize) as usize;
    }

    /// Match counter for display: `"{cursor+1}/{count}"` or `"0 results"`
    pub fn status(&self) -> String {
        match self.matches.len() {
            0 => "0 results".to_string(),
            count => format!("{}/{}", self.cursor + 1, count),
        }
    }

    /// Highlight span for a matched entry
    ///
    /// Spans are computed lazily for all matches at once and cached until
    /// the matches are recomputed.
    pub fn highlight(&mut self, entry_id: u64) -> Option<HighlightSpan> {
        if self.highlights_generation != Some(self.generation) {
            self.highlights = self
                .matches
                .iter()
                .filter_map(|m| Some((m.entry.id, self.matcher.find(&m.entry.plain_message)?)))
                .collect();
            self.highlights_generation = Some(self.generation);
        }
        self.highlights.get(&entry_id).copied()
    }

    /// Fractional scrollbar positions of every match for a projection of `len` rows
    pub fn scrollbar_marks(&self, len: usize) -> Vec<f64> {
        if len <= 1 {
            return vec![0.0; self.matches.len()];
        }
        let last = (len - 1) as f64;
        self.matches
            .iter()
            .map(|m| m.position as f64 / last)
            .collect()
    }

    /// Drop matches and cursor, keeping the query and case mode
    pub fn reset(&mut self) {
        self.matches.clear();
        self.cursor = 0;
        self.projection_version = None;
        self.dirty = true;
        self.generation += 1;
    }
}

/// Pick the candidate closest to `anchor`, scanning in order
///
/// The scan stops at the first candidate whose distance does not strictly
/// improve, so ties resolve to the earlier candidate.
pub fn reanchor(candidates: &[u64], anchor: u64) -> usize {
    let mut best = 0;
    let mut min_distance = u64::MAX;

    for (i, candidate) in candidates.iter().enumerate() {
        let distance = candidate.abs_diff(anchor);
        if distance >= min_distance {
            break;
        }
        min_distance = distance;
        best = i;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedscope_types::{GapMarker, LogEntry};
    use std::sync::Arc;

    /// Rows whose entry IDs equal their positions
    fn rows(messages: &[&str]) -> Vec<Row> {
        messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let mut entry = LogEntry::new(*message, "A", i as f64);
                entry.id = i as u64;
                Row::Entry(Arc::new(entry))
            })
            .collect()
    }

    fn messages_with_hits(len: usize, hits: &[usize]) -> Vec<&'static str> {
        (0..len)
            .map(|i| if hits.contains(&i) { "hit" } else { "miss" })
            .collect()
    }

    #[test]
    fn test_empty_query_has_no_matches() {
        let mut search = SearchEngine::new();
        let rows = rows(&["a", "b"]);
        search.refresh(&rows, 1);
        assert_eq!(search.match_count(), 0);
        assert_eq!(search.status(), "0 results");
        assert_eq!(search.focused(), None);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let mut search = SearchEngine::new();
        let rows = rows(&["Error here", "fine", "an ERROR"]);
        search.set_query("error");
        search.refresh(&rows, 1);
        assert_eq!(search.match_positions(), vec![0, 2]);

        search.set_case_sensitive(true);
        search.refresh(&rows, 1);
        assert_eq!(search.match_positions(), Vec::<usize>::new());
    }

    #[test]
    fn test_markers_are_not_searched() {
        let mut search = SearchEngine::new();
        let mut rows = rows(&["gap", "gap"]);
        rows.insert(
            1,
            Row::Gap(GapMarker {
                after_entry_id: 0,
                elapsed_seconds: 5.0,
            }),
        );
        search.set_query("gap");
        search.refresh(&rows, 1);
        assert_eq!(search.match_positions(), vec![0, 2]);
    }

    #[test]
    fn test_search_uses_plain_message() {
        let mut search = SearchEngine::new();
        let rows = rows(&["<color=#fff>white</color>"]);
        search.set_query("color");
        search.refresh(&rows, 1);
        assert_eq!(search.match_count(), 0);
        search.set_query("white");
        search.refresh(&rows, 1);
        assert_eq!(search.match_count(), 1);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut search = SearchEngine::new();
        let rows = rows(&["x", "x", "x"]);
        search.set_query("x");
        search.refresh(&rows, 1);
        assert_eq!(search.status(), "1/3");

        search.previous();
        assert_eq!(search.cursor(), 2);
        assert_eq!(search.status(), "3/3");
        search.next();
        assert_eq!(search.cursor(), 0);
    }

    #[test]
    fn test_navigation_without_matches_is_noop() {
        let mut search = SearchEngine::new();
        search.next();
        search.previous();
        assert_eq!(search.cursor(), 0);
    }

    #[test]
    fn test_cursor_continuity_across_projection_change() {
        let mut search = SearchEngine::new();
        search.set_query("hit");

        let before = rows(&messages_with_hits(16, &[2, 9, 15]));
        search.refresh(&before, 1);
        search.next();
        assert_eq!(search.focused(), Some(9));

        let after = rows(&messages_with_hits(21, &[2, 10, 20]));
        assert!(search.refresh(&after, 2));
        assert_eq!(search.focused(), Some(10));
        assert_eq!(search.status(), "2/3");
    }

    #[test]
    fn test_refresh_skips_same_version() {
        let mut search = SearchEngine::new();
        let rows = rows(&["x"]);
        search.set_query("x");
        assert!(search.refresh(&rows, 1));
        assert!(!search.refresh(&rows, 1));
        assert!(search.refresh(&rows, 2));
    }

    #[test]
    fn test_stale_matches_force_recompute() {
        let mut search = SearchEngine::new();
        search.set_query("x");
        search.refresh(&rows(&["a", "b", "x"]), 1);
        assert_eq!(search.match_positions(), vec![2]);

        let shorter = rows(&["x"]);
        assert!(search.is_stale(shorter.len()));
        assert!(search.refresh(&shorter, 1));
        assert_eq!(search.match_positions(), vec![0]);
    }

    #[test]
    fn test_highlight_spans() {
        let mut search = SearchEngine::new();
        let rows = rows(&["an Error occurred", "nothing", "ERROR"]);
        search.set_query("error");
        search.refresh(&rows, 1);

        assert_eq!(search.highlight(0), Some(HighlightSpan { start: 3, len: 5 }));
        assert_eq!(search.highlight(1), None);
        assert_eq!(search.highlight(2), Some(HighlightSpan { start: 0, len: 5 }));

        search.set_query("occ");
        search.refresh(&rows, 1);
        assert_eq!(search.highlight(0), Some(HighlightSpan { start: 9, len: 3 }));
        assert_eq!(search.highlight(2), None);
    }

    #[test]
    fn test_highlight_covers_matched_text_when_folding_changes_length() {
        let mut search = SearchEngine::new();
        let rows = rows(&["\u{212A}elvin", "kelvin"]);
        search.set_query("k");
        search.refresh(&rows, 1);

        assert_eq!(search.match_positions(), vec![0, 1]);
        // The Kelvin sign is three bytes; the span covers it whole
        assert_eq!(search.highlight(0), Some(HighlightSpan { start: 0, len: 3 }));
        assert_eq!(search.highlight(1), Some(HighlightSpan { start: 0, len: 1 }));

        search.set_case_sensitive(true);
        search.refresh(&rows, 1);
        assert_eq!(search.match_positions(), vec![1]);
    }

    #[test]
    fn test_query_with_regex_metacharacters_is_literal() {
        let mut search = SearchEngine::new();
        let rows = rows(&["value (x+1)", "value x1"]);
        search.set_query("(x+1)");
        search.refresh(&rows, 1);
        assert_eq!(search.match_positions(), vec![0]);
    }

    #[test]
    fn test_scrollbar_marks() {
        let mut search = SearchEngine::new();
        let rows = rows(&["x", "-", "-", "-", "x"]);
        search.set_query("x");
        search.refresh(&rows, 1);
        assert_eq!(search.scrollbar_marks(rows.len()), vec![0.0, 1.0]);
    }

    #[test]
    fn test_reanchor_first_found_on_tie() {
        assert_eq!(reanchor(&[8, 12], 10), 0);
        assert_eq!(reanchor(&[2, 10, 20], 9), 1);
        assert_eq!(reanchor(&[], 9), 0);
        assert_eq!(reanchor(&[5, 6, 7], 0), 0);
        assert_eq!(reanchor(&[5, 6, 7], 100), 2);
    }
}
