//! Virtualized windowing over the projection
//!
//! Rows have a fixed height, so the rows that need rendering follow directly
//! from the scroll offset.

use serde::Serialize;

/// Inclusive range of projection rows to render
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VisibleRange {
    /// Nothing to render
    Empty,
    Rows { first: usize, last: usize },
}

impl VisibleRange {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Number of rows in the range
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Rows { first, last } => last.saturating_sub(*first) + 1,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        match self {
            Self::Empty => false,
            Self::Rows { first, last } => (*first..=*last).contains(&index),
        }
    }

    /// As a half-open `Range`, for slicing the projection
    pub fn as_range(&self) -> std::ops::Range<usize> {
        match self {
            Self::Empty => 0..0,
            Self::Rows { first, last } => *first..*last + 1,
        }
    }
}

/// Rows intersecting `[offset, offset + viewport_height]` for `len` rows
pub fn visible_range(
    scroll_offset: f64,
    viewport_height: f64,
    row_height: f64,
    len: usize,
) -> VisibleRange {
    if len == 0 || row_height.is_nan() || row_height <= 0.0 {
        return VisibleRange::Empty;
    }

    let max_index = len - 1;
    let viewport_height = if viewport_height.is_nan() {
        0.0
    } else {
        viewport_height.max(0.0)
    };
    let clamp = |position: f64| -> usize {
        let index = (position / row_height).floor();
        if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(max_index)
        }
    };

    VisibleRange::Rows {
        first: clamp(scroll_offset),
        last: clamp(scroll_offset + viewport_height),
    }
}

/// Scroll state of the console view
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub scroll_offset: f64,
    pub viewport_height: f64,
    row_height: f64,

    /// Total content height at the last update
    previous_total_height: f64,
    previous_len: Option<usize>,

    /// User is dragging the scrollbar; out-of-range offsets are tolerated
    dragging: bool,
}

impl Viewport {
    pub fn new(row_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_offset: 0.0,
            viewport_height: viewport_height.max(0.0),
            row_height,
            previous_total_height: 0.0,
            previous_len: None,
            dragging: false,
        }
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn previous_total_height(&self) -> f64 {
        self.previous_total_height
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height.max(0.0);
    }

    /// Scroll to an offset, as reported by the presentation layer
    pub fn scroll_to(&mut self, offset: f64) {
        self.scroll_offset = offset;
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.scroll_offset += delta;
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Whether the view was resting at (or within a row of) the bottom
    pub fn at_bottom(&self) -> bool {
        self.scroll_offset + self.viewport_height >= self.previous_total_height - self.row_height
    }

    /// Adjust the scroll offset for a projection of `len` rows
    ///
    /// When the length changed and the view was at the bottom, the view
    /// sticks to the new bottom. Otherwise the offset is kept, clamped to the
    /// content unless a drag is in progress.
    pub fn update(&mut self, len: usize) {
        let total_height = len as f64 * self.row_height;
        let max_offset = (total_height - self.viewport_height).max(0.0);
        let changed = self.previous_len != Some(len);

        if changed && self.at_bottom() {
            self.scroll_offset = max_offset;
        } else if !self.dragging {
            self.scroll_offset = self.scroll_offset.clamp(0.0, max_offset);
        }

        self.previous_total_height = total_height;
        self.previous_len = Some(len);
    }

    /// Centre row `index` in the view
    pub fn center_on(&mut self, index: usize) {
        let offset = index as f64 * self.row_height - (self.viewport_height - self.row_height) / 2.0;
        self.scroll_offset = offset.clamp(0.0, self.previous_total_height.max(0.0));
    }

    /// Rows to render for a projection of `len` rows
    pub fn visible_range(&self, len: usize) -> VisibleRange {
        visible_range(self.scroll_offset, self.viewport_height, self.row_height, len)
    }

    /// Whether the content overflows the view
    pub fn scrollbar_visible(&self) -> bool {
        self.viewport_height < self.previous_total_height - 1.0
    }

    /// Forget the previous content size
    pub fn reset(&mut self) {
        self.scroll_offset = 0.0;
        self.previous_total_height = 0.0;
        self.previous_len = None;
        self.dragging = false;
    }
}
