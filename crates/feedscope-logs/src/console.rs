//! The rebuild-cycle driver
//!
//! [`LogConsole`] owns the store and every derived structure. Each call to
//! [`LogConsole::rebuild`] snapshots the store and runs the stages in order:
//! filter and group, annotate gaps, refresh search, window. Nothing outside
//! a rebuild ever sees a half-built projection.

use std::sync::Arc;

use serde::Serialize;

use feedscope_types::{ArcLogEntry, HighlightSpan, Layer, LogEntry, Row, Severity, UNDEFINED_LAYER};

use crate::buffer::LogBuffer;
use crate::config::ConsoleConfig;
use crate::export::{self, ExportRow};
use crate::filter::VisibilityFilter;
use crate::gap;
use crate::group::HiddenRunGrouper;
use crate::record::{HostLogKind, LogRecord};
use crate::search::SearchEngine;
use crate::stack::{self, StackFrame};
use crate::viewport::{Viewport, VisibleRange};

/// Where a rebuild cycle currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RebuildStage {
    Idle,
    Filtering,
    Grouping,
    Annotating,
    Searching,
    Windowing,
}

pub struct LogConsole {
    name: String,
    config: ConsoleConfig,
    layers: Vec<Layer>,

    buffer: LogBuffer,
    filter: VisibilityFilter,
    grouper: HiddenRunGrouper,
    search: SearchEngine,
    viewport: Viewport,

    /// Store snapshot taken by the last rebuild, in ID order
    entries: Vec<ArcLogEntry>,

    /// The visible projection
    rows: Vec<Row>,

    /// Bumped whenever `rows` changes
    projection_version: u64,

    window: VisibleRange,
    stage: RebuildStage,
    selected: Option<u64>,
}

impl LogConsole {
    pub fn new(name: impl Into<String>, config: ConsoleConfig) -> Self {
        let layers = config.layer_table();
        Self {
            name: name.into(),
            buffer: LogBuffer::new(config.max_entries),
            filter: VisibilityFilter::new(),
            grouper: HiddenRunGrouper::new(),
            search: SearchEngine::new(),
            viewport: Viewport::new(config.row_height, 0.0),
            entries: Vec::new(),
            rows: Vec::new(),
            projection_version: 0,
            window: VisibleRange::Empty,
            stage: RebuildStage::Idle,
            selected: None,
            layers,
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Handle to the store; clones share it, so producers on other threads
    /// can append while the console rebuilds
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn append(&self, record: LogRecord) {
        self.buffer.push(record);
    }

    /// Mirror a host runtime message; plain host logs are dropped
    pub fn append_host(&self, message: &str, stack: &str, kind: HostLogKind) {
        if let Some(record) = LogRecord::from_host(message, stack, kind) {
            self.buffer.push(record);
        }
    }

    // ------------------------------------------------------------------
    // Rebuild cycle
    // ------------------------------------------------------------------

    fn enter(&mut self, stage: RebuildStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "Rebuild stage");
        self.stage = stage;
    }

    /// Run one rebuild cycle and return the rows to render
    pub fn rebuild(&mut self) -> VisibleRange {
        self.enter(RebuildStage::Filtering);
        let snapshot = self.buffer.snapshot();
        self.filter.register_tags(self.buffer.tags());

        self.enter(RebuildStage::Grouping);
        let rows = self
            .grouper
            .build(&snapshot.entries, &self.filter, self.config.hidden_groups);

        self.enter(RebuildStage::Annotating);
        let rows = if self.config.gaps.enabled {
            gap::annotate(rows, self.config.gaps.threshold)
        } else {
            rows
        };

        if !same_rows(&rows, &self.rows) {
            self.rows = rows;
            self.projection_version += 1;
            tracing::debug!(
                rows = self.rows.len(),
                version = self.projection_version,
                store_version = snapshot.version,
                "Projection rebuilt"
            );
        }
        self.entries = snapshot.entries;

        self.enter(RebuildStage::Searching);
        self.search.refresh(&self.rows, self.projection_version);

        self.enter(RebuildStage::Windowing);
        self.viewport.update(self.rows.len());
        self.window = self.viewport.visible_range(self.rows.len());

        if let Some(id) = self.selected {
            if self.find_entry(id).is_none() {
                self.selected = None;
            }
        }

        self.enter(RebuildStage::Idle);
        self.window
    }

    pub fn stage(&self) -> RebuildStage {
        self.stage
    }

    /// The full visible projection
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn projection_version(&self) -> u64 {
        self.projection_version
    }

    /// Render range from the last rebuild
    pub fn window(&self) -> VisibleRange {
        self.window
    }

    /// Rows inside the render range
    pub fn visible_rows(&self) -> &[Row] {
        self.rows.get(self.window.as_range()).unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // Filters and groups
    // ------------------------------------------------------------------

    /// Configured layers
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_visible(&self, layer: &str) -> bool {
        self.filter.layer_visible(layer)
    }

    pub fn set_layer_visible(&mut self, layer: &str, visible: bool) {
        self.filter.set_layer(layer, visible);
    }

    pub fn toggle_layer(&mut self, layer: &str) {
        self.filter.toggle_layer(layer);
    }

    /// "Everything": show every configured layer
    pub fn show_all_layers(&mut self) {
        self.filter.set_all_layers(&self.layers, true);
    }

    /// "Nothing": hide every configured layer
    pub fn hide_all_layers(&mut self) {
        self.filter.set_all_layers(&self.layers, false);
    }

    pub fn all_layers_visible(&self) -> bool {
        self.filter.all_layers_on(&self.layers)
    }

    pub fn no_layers_visible(&self) -> bool {
        self.filter.all_layers_off(&self.layers)
    }

    pub fn set_tag_visible(&mut self, tag: &str, visible: bool) {
        self.filter.set_tag(tag, visible);
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        self.filter.toggle_tag(tag);
    }

    /// Known tags and their visibility, in name order
    pub fn tags(&self) -> Vec<(String, bool)> {
        self.filter.tags()
    }

    /// Expand or collapse the group starting at `first_entry_id`
    pub fn toggle_group(&mut self, first_entry_id: u64) -> bool {
        self.grouper.toggle(first_entry_id)
    }

    pub fn set_group_expanded(&mut self, first_entry_id: u64, expanded: bool) -> bool {
        self.grouper.set_expanded(first_entry_id, expanded)
    }

    /// Colour for an entry's label
    ///
    /// Warnings and errors on the undefined layer take their severity colour.
    pub fn label_color(&self, entry: &LogEntry) -> String {
        if entry.layer == UNDEFINED_LAYER
            && matches!(entry.severity, Severity::Warning | Severity::Error)
        {
            return entry.severity.hex().to_string();
        }
        self.layers
            .iter()
            .find(|l| l.name == entry.layer)
            .map(|l| l.hex.clone())
            .unwrap_or_else(|| Layer::undefined().hex)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    pub fn search_query(&self) -> &str {
        self.search.query()
    }

    /// Change the query and focus the nearest match
    pub fn set_query(&mut self, query: &str) {
        if self.search.set_query(query) {
            self.search.refresh(&self.rows, self.projection_version);
            self.focus_match();
        }
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        if self.search.set_case_sensitive(case_sensitive) {
            self.search.refresh(&self.rows, self.projection_version);
            self.focus_match();
        }
    }

    pub fn toggle_case_sensitive(&mut self) {
        let case_sensitive = !self.search.case_sensitive();
        self.set_case_sensitive(case_sensitive);
    }

    pub fn next_match(&mut self) {
        self.search.next();
        self.focus_match();
    }

    pub fn previous_match(&mut self) {
        self.search.previous();
        self.focus_match();
    }

    /// Select the cursor's match and centre it in the view
    fn focus_match(&mut self) {
        let Some(position) = self.search.focused() else {
            return;
        };
        self.selected = self.search.focused_entry().map(|e| e.id);
        self.viewport.center_on(position);
        self.window = self.viewport.visible_range(self.rows.len());
    }

    /// `"{cursor+1}/{count}"` or `"0 results"`
    pub fn search_status(&self) -> String {
        self.search.status()
    }

    pub fn match_positions(&self) -> Vec<usize> {
        self.search.match_positions()
    }

    pub fn highlight(&mut self, entry_id: u64) -> Option<HighlightSpan> {
        self.search.highlight(entry_id)
    }

    pub fn scrollbar_marks(&self) -> Vec<f64> {
        self.search.scrollbar_marks(self.rows.len())
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport.set_viewport_height(height);
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.viewport.scroll_to(offset);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn find_entry(&self, id: u64) -> Option<&ArcLogEntry> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Select an entry; fails if it is not in the store
    pub fn select(&mut self, id: u64) -> bool {
        if self.find_entry(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_entry(&self) -> Option<&ArcLogEntry> {
        self.find_entry(self.selected?)
    }

    /// Stack frames of the selected entry
    pub fn selected_stack(&self) -> Vec<StackFrame> {
        self.selected_entry()
            .map(|e| stack::parse_stack(&e.stack))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Drop every entry and all state derived from them
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.filter.clear_tags();
        self.grouper.reset();
        self.search.reset();
        self.viewport.reset();
        self.entries.clear();
        self.rows.clear();
        self.projection_version += 1;
        self.window = VisibleRange::Empty;
        self.selected = None;
        tracing::debug!("Console cleared");
    }

    /// `"{name} ({count})"`, or just the name when empty
    pub fn title(&self) -> String {
        match self.buffer.len() {
            0 => self.name.clone(),
            count => format!("{} ({})", self.name, count),
        }
    }

    /// Store contents for exporters, with gap rows per the gap settings
    pub fn export_rows(&self) -> Vec<ExportRow> {
        export::export_rows(&self.buffer.all(), &self.config.gaps)
    }

    pub fn export_raw(&self) -> String {
        self.buffer.export_raw()
    }
}

/// Entry rows compare by identity; snapshots share the store's `Arc`s, so
/// an unchanged projection never walks message text
fn same_rows(a: &[Row], b: &[Row]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Row::Entry(x), Row::Entry(y)) => Arc::ptr_eq(x, y),
            (x, y) => x == y,
        })
}
