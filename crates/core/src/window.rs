use serde::{Deserialize, Serialize};

/// Layout of data returned for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Each returned vector is one grid row.
    #[default]
    Rows,
    /// Each returned vector is one grid column.
    Columns,
}

impl Orientation {
    pub fn is_rows(&self) -> bool {
        matches!(self, Orientation::Rows)
    }
}

/// A rectangular slice of the grid.
///
/// Coordinates are 1-based absolute grid positions. Stops are exclusive and
/// `None` means the slice runs to the end of the grid on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalWindow {
    pub row_start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_stop: Option<u32>,
    pub col_start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_stop: Option<u32>,
    #[serde(default, skip_serializing_if = "Orientation::is_rows")]
    pub orientation: Orientation,
}

impl Default for LogicalWindow {
    fn default() -> Self {
        Self {
            row_start: 1,
            row_stop: None,
            col_start: 1,
            col_stop: None,
            orientation: Orientation::Rows,
        }
    }
}

impl LogicalWindow {
    pub fn new(row_start: u32, row_stop: Option<u32>, col_start: u32, col_stop: Option<u32>) -> Self {
        Self {
            row_start,
            row_stop,
            col_start,
            col_stop,
            orientation: Orientation::Rows,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Narrow the window to the intersection of its bounds and the given ones.
    ///
    /// Omitted bounds keep the current value. The result never extends past
    /// the original window on any side.
    pub fn crop(
        &self,
        row_start: Option<u32>,
        row_stop: Option<u32>,
        col_start: Option<u32>,
        col_stop: Option<u32>,
    ) -> Self {
        Self {
            row_start: row_start.map_or(self.row_start, |s| s.max(self.row_start)),
            row_stop: narrow_stop(self.row_stop, row_stop),
            col_start: col_start.map_or(self.col_start, |s| s.max(self.col_start)),
            col_stop: narrow_stop(self.col_stop, col_stop),
            orientation: self.orientation,
        }
    }

    /// Number of rows, or `None` when unbounded.
    pub fn row_count(&self) -> Option<u32> {
        self.row_stop.map(|stop| stop.saturating_sub(self.row_start))
    }

    /// Number of columns, or `None` when unbounded.
    pub fn col_count(&self) -> Option<u32> {
        self.col_stop.map(|stop| stop.saturating_sub(self.col_start))
    }

    /// True when either axis is bounded to zero width.
    pub fn is_empty(&self) -> bool {
        self.row_count() == Some(0) || self.col_count() == Some(0)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.row_start
            && self.row_stop.map_or(true, |stop| row < stop)
            && col >= self.col_start
            && self.col_stop.map_or(true, |stop| col < stop)
    }
}

fn narrow_stop(current: Option<u32>, requested: Option<u32>) -> Option<u32> {
    match (current, requested) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
