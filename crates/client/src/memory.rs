//! In-process grid executor.

use std::iter;
use std::sync::Arc;

use parking_lot::Mutex;
use sheetwire_core::{CellValue, LogicalWindow};
use sheetwire_protocol::{DataBlock, DeleteRange, HeaderNode, ReadData, ReadSpec, Request, Response, WriteData};

use crate::executor::{ExecuteFuture, ExecutorError, GridExecutor};

/// A dense grid held in memory.
///
/// Clones share the same grid, so a host can keep a handle for inspection
/// while the pipeline owns another.
#[derive(Clone, Default)]
pub struct MemoryGrid {
    state: Arc<Mutex<GridState>>,
}

#[derive(Default)]
struct GridState {
    /// Row-major; every row is exactly `col_count` wide.
    rows: Vec<Vec<CellValue>>,
    col_count: u32,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from row-major cells. Short rows are padded.
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(col_count, CellValue::Empty);
                row
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(GridState { rows, col_count: col_count as u32 })),
        }
    }

    pub fn row_count(&self) -> u32 {
        self.state.lock().rows.len() as u32
    }

    pub fn col_count(&self) -> u32 {
        self.state.lock().col_count
    }

    /// Value at a 1-based position. Outside the grid everything is empty.
    pub fn cell(&self, row: u32, col: u32) -> CellValue {
        self.state.lock().cell(row, col)
    }

    pub fn snapshot(&self) -> Vec<Vec<CellValue>> {
        self.state.lock().rows.clone()
    }

    /// Perform one request atomically.
    ///
    /// Order: deletions, insertions (rows then columns), write, headers,
    /// data read.
    pub fn apply(&self, request: &Request) -> Result<Response, ExecutorError> {
        request.validate()?;

        let limit = request.limit.unwrap_or_default();
        let mut grid = self.state.lock();

        for range in request.delete_rows.iter().filter(|r| !r.is_empty()) {
            grid.delete_rows(*range);
        }
        for range in request.delete_columns.iter().filter(|r| !r.is_empty()) {
            grid.delete_columns(*range);
        }
        if let Some(insert) = &request.insert_rows {
            grid.insert_rows(insert.position, insert.count());
        }
        if let Some(insert) = &request.insert_columns {
            grid.insert_columns(insert.position, insert.count());
        }
        if let Some(write) = &request.write_data {
            grid.write(write, &limit);
        }

        let spec = match &request.read_data {
            Some(ReadData::Spec(spec)) => Some(spec),
            _ => None,
        };
        let has_header_row = request.read_headers || spec.is_some_and(|s| s.col_headers.is_some());

        let headers = request.read_headers.then(|| grid.headers(&limit));
        let data = match &request.read_data {
            Some(read) if read.wants_data() => Some(grid.read(spec, &limit, has_header_row)?),
            _ => None,
        };

        Ok(Response {
            headers,
            data,
            inserted_rows: request.insert_rows.is_some(),
            inserted_columns: request.insert_columns.is_some(),
            deleted_rows: !request.delete_rows.is_empty(),
            deleted_columns: !request.delete_columns.is_empty(),
            wrote_data: request.write_data.is_some(),
        })
    }
}

impl GridExecutor for MemoryGrid {
    fn execute(&self, request: Request) -> ExecuteFuture {
        let result = self.apply(&request);
        Box::pin(smol::future::ready(result))
    }
}

impl GridState {
    fn cell(&self, row: u32, col: u32) -> CellValue {
        if row == 0 || col == 0 {
            return CellValue::Empty;
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .cloned()
            .unwrap_or_default()
    }

    fn blank_row(&self) -> Vec<CellValue> {
        vec![CellValue::Empty; self.col_count as usize]
    }

    fn ensure_rows(&mut self, count: usize) {
        while self.rows.len() < count {
            let blank = self.blank_row();
            self.rows.push(blank);
        }
    }

    fn ensure_cols(&mut self, count: u32) {
        if count > self.col_count {
            self.col_count = count;
            for row in &mut self.rows {
                row.resize(count as usize, CellValue::Empty);
            }
        }
    }

    /// Clamp a 1-based half-open range to 0-based indices into `len` items.
    fn span(range: DeleteRange, len: usize) -> (usize, usize) {
        let from = (range.start as usize - 1).min(len);
        let to = (range.stop as usize - 1).min(len);
        (from, to)
    }

    fn delete_rows(&mut self, range: DeleteRange) {
        let (from, to) = Self::span(range, self.rows.len());
        if from < to {
            self.rows.drain(from..to);
        }
    }

    fn delete_columns(&mut self, range: DeleteRange) {
        let (from, to) = Self::span(range, self.col_count as usize);
        if from < to {
            for row in &mut self.rows {
                row.drain(from..to);
            }
            self.col_count -= (to - from) as u32;
        }
    }

    fn insert_rows(&mut self, position: u32, count: u32) {
        let at = position as usize - 1;
        self.ensure_rows(at);
        let blank = self.blank_row();
        self.rows.splice(at..at, iter::repeat(blank).take(count as usize));
    }

    fn insert_columns(&mut self, position: u32, count: u32) {
        let at = position as usize - 1;
        self.ensure_cols(at as u32);
        for row in &mut self.rows {
            row.splice(at..at, iter::repeat(CellValue::Empty).take(count as usize));
        }
        self.col_count += count;
    }

    /// Cells outside the limit are dropped.
    fn write(&mut self, write: &WriteData, limit: &LogicalWindow) {
        for (offset, cells) in write.rows.iter().enumerate() {
            let Some(cells) = cells else {
                continue;
            };
            let row = write.row_start + offset as u32;
            for (index, value) in cells.iter().enumerate() {
                let col = match &write.col_numbers {
                    Some(cols) => match cols.get(index) {
                        Some(&col) => col,
                        None => continue,
                    },
                    None => limit.col_start + index as u32,
                };
                if !limit.contains(row, col) {
                    continue;
                }
                self.ensure_rows(row as usize);
                self.ensure_cols(col);
                self.rows[row as usize - 1][col as usize - 1] = value.clone();
            }
        }
    }

    /// `[start, stop)` of the limit's rows, with an open stop resolved to
    /// the grid's extent.
    fn row_bounds(&self, limit: &LogicalWindow) -> (u32, u32) {
        let extent = self.rows.len() as u32 + 1;
        let stop = limit.row_stop.map_or(extent, |s| s.min(extent));
        (limit.row_start, stop.max(limit.row_start))
    }

    fn col_bounds(&self, limit: &LogicalWindow) -> (u32, u32) {
        let extent = self.col_count + 1;
        let stop = limit.col_stop.map_or(extent, |s| s.min(extent));
        (limit.col_start, stop.max(limit.col_start))
    }

    /// One top-level node per labelled cell of the limit's first row.
    fn headers(&self, limit: &LogicalWindow) -> Vec<HeaderNode> {
        let (from, to) = self.col_bounds(limit);
        (from..to)
            .filter_map(|col| {
                let value = self.cell(limit.row_start, col);
                (!value.is_empty()).then(|| HeaderNode {
                    label: value.to_string(),
                    col_start: col,
                    col_stop: col + 1,
                    children: Vec::new(),
                })
            })
            .collect()
    }

    fn read(
        &self,
        spec: Option<&ReadSpec>,
        limit: &LogicalWindow,
        has_header_row: bool,
    ) -> Result<DataBlock, ExecutorError> {
        let (col_from, col_to) = self.col_bounds(limit);
        let col_numbers: Vec<u32> = match spec {
            Some(ReadSpec { col_numbers: Some(cols), .. }) => cols
                .iter()
                .copied()
                .filter(|col| (col_from..col_to).contains(col))
                .collect(),
            Some(ReadSpec { col_headers: Some(names), .. }) => {
                let headers = self.headers(limit);
                names
                    .iter()
                    .map(|name| {
                        headers
                            .iter()
                            .find(|h| &h.label == name)
                            .map(|h| h.col_start)
                            .ok_or_else(|| ExecutorError::Rejected(format!("unknown column header {:?}", name)))
                    })
                    .collect::<Result<_, _>>()?
            }
            _ => (col_from..col_to).collect(),
        };

        let (mut row_from, mut row_to) = self.row_bounds(limit);
        if has_header_row {
            row_from += 1;
        }
        if let Some(spec) = spec {
            row_from = spec.row_start.map_or(row_from, |s| s.max(row_from));
            row_to = spec.row_stop.map_or(row_to, |s| s.min(row_to));
        }
        let row_to = row_to.max(row_from);

        let rows = if limit.orientation.is_rows() {
            (row_from..row_to)
                .map(|row| col_numbers.iter().map(|&col| self.cell(row, col)).collect())
                .collect()
        } else {
            col_numbers
                .iter()
                .map(|&col| (row_from..row_to).map(|row| self.cell(row, col)).collect())
                .collect()
        };

        Ok(DataBlock { rows, col_numbers, row_offset: row_from })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetwire_core::Orientation;
    use sheetwire_protocol::InsertSpec;

    fn grid(rows: &[&[&str]]) -> MemoryGrid {
        MemoryGrid::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|v| CellValue::from(*v)).collect())
                .collect(),
        )
    }

    fn text(rows: &[Vec<CellValue>]) -> Vec<Vec<String>> {
        rows.iter().map(|row| row.iter().map(|c| c.to_string()).collect()).collect()
    }

    fn read_all(limit: LogicalWindow) -> Request {
        Request { limit: Some(limit), read_data: Some(ReadData::Flag(true)), ..Request::default() }
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let g = grid(&[&["a", "b", "c"], &["d"]]);
        assert_eq!(g.col_count(), 3);
        assert_eq!(g.row_count(), 2);
        assert_eq!(g.cell(2, 3), CellValue::Empty);
        assert_eq!(g.cell(9, 9), CellValue::Empty);
    }

    #[test]
    fn test_read_resolves_open_stops() {
        let g = grid(&[&["a", "b"], &["c", "d"]]);
        let response = g.apply(&read_all(LogicalWindow::default())).unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.col_numbers, vec![1, 2]);
        assert_eq!(data.row_offset, 1);
        assert_eq!(text(&data.rows), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_read_clamps_to_extent() {
        let g = grid(&[&["a", "b"], &["c", "d"]]);
        let response = g.apply(&read_all(LogicalWindow::new(2, Some(50), 2, Some(50)))).unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.col_numbers, vec![2]);
        assert_eq!(text(&data.rows), vec![vec!["d"]]);
    }

    #[test]
    fn test_column_orientation_transposes() {
        let g = grid(&[&["a", "b"], &["c", "d"]]);
        let limit = LogicalWindow::default().with_orientation(Orientation::Columns);
        let data = g.apply(&read_all(limit)).unwrap().data.unwrap();
        assert_eq!(text(&data.rows), vec![vec!["a", "c"], vec!["b", "d"]]);
    }

    #[test]
    fn test_headers_and_named_columns() {
        let g = grid(&[&["id", "", "name"], &["1", "x", "ann"], &["2", "y", "bob"]]);
        let request = Request {
            read_headers: true,
            read_data: Some(ReadData::Spec(ReadSpec {
                col_headers: Some(vec!["name".into(), "id".into()]),
                ..ReadSpec::default()
            })),
            ..Request::default()
        };
        let response = g.apply(&request).unwrap();
        let labels: Vec<_> = response.headers.unwrap().into_iter().map(|h| h.label).collect();
        assert_eq!(labels, vec!["id", "name"]);

        let data = response.data.unwrap();
        assert_eq!(data.col_numbers, vec![3, 1]);
        assert_eq!(data.row_offset, 2);
        assert_eq!(text(&data.rows), vec![vec!["ann", "1"], vec!["bob", "2"]]);
    }

    #[test]
    fn test_unknown_header_rejected() {
        let g = grid(&[&["id"], &["1"]]);
        let request = Request {
            read_data: Some(ReadData::Spec(ReadSpec {
                col_headers: Some(vec!["missing".into()]),
                ..ReadSpec::default()
            })),
            ..Request::default()
        };
        assert!(matches!(g.apply(&request), Err(ExecutorError::Rejected(_))));
    }

    #[test]
    fn test_structural_order() {
        let g = grid(&[&["1"], &["2"], &["3"], &["4"], &["5"]]);
        // Deletions run first, so the insert position is post-deletion
        let request = Request {
            delete_rows: vec![DeleteRange::new(4, 1), DeleteRange::new(1, 2)],
            insert_rows: Some(InsertSpec::new(2, 1)),
            ..Request::default()
        };
        let response = g.apply(&request).unwrap();
        assert!(response.deleted_rows && response.inserted_rows);
        assert_eq!(text(&g.snapshot()), vec![vec!["3"], vec![""], vec!["5"]]);
    }

    #[test]
    fn test_insert_and_delete_columns() {
        let g = grid(&[&["a", "b", "c"]]);
        g.apply(&Request { insert_columns: Some(InsertSpec::new(2, 2)), ..Request::default() })
            .unwrap();
        assert_eq!(text(&g.snapshot()), vec![vec!["a", "", "", "b", "c"]]);

        g.apply(&Request { delete_columns: vec![DeleteRange::new(4, 5)], ..Request::default() })
            .unwrap();
        assert_eq!(g.col_count(), 3);
        assert_eq!(text(&g.snapshot()), vec![vec!["a", "", ""]]);
    }

    #[test]
    fn test_write_explicit_columns_and_clipping() {
        let g = grid(&[&["", "", ""], &["", "", ""]]);
        let request = Request {
            limit: Some(LogicalWindow::new(1, Some(2), 1, None)),
            write_data: Some(WriteData {
                col_numbers: Some(vec![3, 1]),
                row_start: 1,
                rows: vec![Some(vec!["x".into(), "y".into()]), Some(vec!["lost".into()])],
            }),
            ..Request::default()
        };
        assert!(g.apply(&request).unwrap().wrote_data);
        assert_eq!(text(&g.snapshot()), vec![vec!["y", "", "x"], vec!["", "", ""]]);
    }

    #[test]
    fn test_write_grows_grid() {
        let g = MemoryGrid::new();
        let request = Request {
            limit: Some(LogicalWindow::new(1, None, 2, None)),
            write_data: Some(WriteData {
                col_numbers: None,
                row_start: 3,
                rows: vec![Some(vec!["a".into(), "b".into()])],
            }),
            ..Request::default()
        };
        g.apply(&request).unwrap();
        assert_eq!((g.row_count(), g.col_count()), (3, 3));
        assert_eq!(g.cell(3, 2), CellValue::from("a"));
        assert_eq!(g.cell(3, 3), CellValue::from("b"));
    }

    #[test]
    fn test_invalid_request_rejected() {
        let g = grid(&[&["a"]]);
        let request = Request {
            delete_rows: vec![DeleteRange::new(1, 1), DeleteRange::new(3, 1)],
            ..Request::default()
        };
        assert!(matches!(g.apply(&request), Err(ExecutorError::Contract(_))));
        assert_eq!(g.row_count(), 1);
    }
}
