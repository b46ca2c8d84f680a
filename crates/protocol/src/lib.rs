//! Grid Executor Protocol: v1 Wire Format
//!
//! This crate defines the message shapes exchanged between the request
//! pipeline and a grid executor. One `Request` is one atomic grid operation;
//! the executor answers with one `Response`.
//!
//! The wire format is JSON with camelCase field names. Every instruction is
//! optional, so a request is a bag of instructions that the executor applies
//! in a fixed order: deletions, insertions, writes, then reads.
//!
//! # Usage
//!
//! ```ignore
//! use sheetwire_protocol::{Request, InsertSpec};
//!
//! let request = Request {
//!     insert_rows: Some(InsertSpec::new(5, 2)),
//!     ..Request::default()
//! };
//! request.validate()?;
//! let json = serde_json::to_string(&request)?;
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use sheetwire_core::{CellValue, LogicalWindow};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Pipeline → Executor
// =============================================================================

/// A single logical operation against the grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Constrains every other field of the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<LogicalWindow>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_headers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_data: Option<ReadData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_data: Option<WriteData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_rows: Option<InsertSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_columns: Option<InsertSpec>,
    /// Sorted by decreasing `start`, non-overlapping.
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub delete_rows: Vec<DeleteRange>,
    /// Sorted by decreasing `start`, non-overlapping.
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub delete_columns: Vec<DeleteRange>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(DeleteRange),
    Many(Vec<DeleteRange>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<DeleteRange>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(range) => vec![range],
        OneOrMany::Many(ranges) => ranges,
    })
}

/// How a request is scheduled by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Carries an insert or delete instruction.
    Structural,
    Write,
    Read,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Structural => write!(f, "structural"),
            RequestKind::Write => write!(f, "write"),
            RequestKind::Read => write!(f, "read"),
        }
    }
}

impl Request {
    pub fn is_structural(&self) -> bool {
        self.insert_rows.is_some()
            || self.insert_columns.is_some()
            || !self.delete_rows.is_empty()
            || !self.delete_columns.is_empty()
    }

    pub fn kind(&self) -> RequestKind {
        if self.is_structural() {
            RequestKind::Structural
        } else if self.write_data.is_some() {
            RequestKind::Write
        } else {
            RequestKind::Read
        }
    }

    /// Check the executor contract. Violations are caller errors and are
    /// never repaired.
    pub fn validate(&self) -> Result<(), ContractError> {
        if let Some(limit) = &self.limit {
            require_position("limit.rowStart", limit.row_start)?;
            require_position("limit.colStart", limit.col_start)?;
        }
        if let Some(ReadData::Spec(spec)) = &self.read_data {
            if let Some(cols) = &spec.col_numbers {
                for &col in cols {
                    require_position("readData.colNumbers", col)?;
                }
            }
        }
        if let Some(write) = &self.write_data {
            require_position("writeData.rowStart", write.row_start)?;
            if let Some(cols) = &write.col_numbers {
                for &col in cols {
                    require_position("writeData.colNumbers", col)?;
                }
                for (index, row) in write.rows.iter().enumerate() {
                    if let Some(cells) = row {
                        if cells.len() > cols.len() {
                            return Err(ContractError::WriteWidth {
                                row: index,
                                width: cells.len(),
                                columns: cols.len(),
                            });
                        }
                    }
                }
            }
        }
        if let Some(insert) = &self.insert_rows {
            require_position("insertRows.position", insert.position)?;
        }
        if let Some(insert) = &self.insert_columns {
            require_position("insertColumns.position", insert.position)?;
        }
        validate_deletes(Dimension::Rows, &self.delete_rows)?;
        validate_deletes(Dimension::Columns, &self.delete_columns)?;
        Ok(())
    }
}

fn require_position(field: &'static str, value: u32) -> Result<(), ContractError> {
    if value == 0 {
        return Err(ContractError::ZeroPosition { field });
    }
    Ok(())
}

fn validate_deletes(dimension: Dimension, ranges: &[DeleteRange]) -> Result<(), ContractError> {
    let mut previous: Option<&DeleteRange> = None;
    for range in ranges {
        if range.stop < range.start {
            return Err(ContractError::InvertedRange {
                dimension,
                start: range.start,
                stop: range.stop,
            });
        }
        if range.is_empty() {
            continue;
        }
        require_position("delete range start", range.start)?;
        if let Some(prev) = previous {
            if range.start >= prev.start {
                return Err(ContractError::UnsortedDeletes { dimension });
            }
            if range.stop > prev.start {
                return Err(ContractError::OverlappingDeletes {
                    dimension,
                    start: range.start,
                    stop: range.stop,
                });
            }
        }
        previous = Some(range);
    }
    Ok(())
}

/// Read instruction: a plain flag or a narrowed read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadData {
    Flag(bool),
    Spec(ReadSpec),
}

impl ReadData {
    pub fn wants_data(&self) -> bool {
        !matches!(self, ReadData::Flag(false))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_numbers: Option<Vec<u32>>,
    /// Top-level header labels, resolved by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_stop: Option<u32>,
}

/// A block of rows written from `row_start` downwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteData {
    /// Explicit target column for each cell position. Without it the block
    /// starts at the limit's first column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_numbers: Option<Vec<u32>>,
    pub row_start: u32,
    /// `None` rows are left untouched.
    pub rows: Vec<Option<Vec<CellValue>>>,
}

impl WriteData {
    /// Widest row in the block.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.as_ref().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSpec {
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl InsertSpec {
    pub fn new(position: u32, count: u32) -> Self {
        Self { position, count: Some(count) }
    }

    /// Effective count (defaults to 1).
    pub fn count(&self) -> u32 {
        self.count.unwrap_or(1)
    }
}

/// Half-open span `[start, stop)`. `start == stop` marks a range that has
/// been neutralized by an earlier deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRange {
    pub start: u32,
    pub stop: u32,
}

impl DeleteRange {
    pub fn new(position: u32, count: u32) -> Self {
        Self { start: position, stop: position + count }
    }

    pub fn len(&self) -> u32 {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }
}

// =============================================================================
// Executor → Pipeline
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataBlock>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inserted_rows: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inserted_columns: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted_rows: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted_columns: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrote_data: bool,
}

/// One labeled column span. Opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderNode {
    pub label: String,
    pub col_start: u32,
    pub col_stop: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HeaderNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBlock {
    pub rows: Vec<Vec<CellValue>>,
    /// Grid column of each returned cell position.
    pub col_numbers: Vec<u32>,
    /// Grid row of the first returned row.
    pub row_offset: u32,
}

// =============================================================================
// Structural change events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Rows,
    Columns,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Rows => write!(f, "rows"),
            Dimension::Columns => write!(f, "columns"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Inserted => write!(f, "inserted"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// One contiguous structural effect of a settled request.
///
/// `position` is expressed in the coordinate space the still-queued requests
/// are in when the event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChange {
    pub change: ChangeKind,
    pub dimension: Dimension,
    pub position: u32,
    pub count: u32,
}

impl StructuralChange {
    pub fn inserted(dimension: Dimension, position: u32, count: u32) -> Self {
        Self { change: ChangeKind::Inserted, dimension, position, count }
    }

    pub fn deleted(dimension: Dimension, position: u32, count: u32) -> Self {
        Self { change: ChangeKind::Deleted, dimension, position, count }
    }
}

impl fmt::Display for StructuralChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} at {}", self.change, self.count, self.dimension, self.position)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A request that breaks the executor contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("{field} must be 1 or greater")]
    ZeroPosition { field: &'static str },
    #[error("delete range {start}..{stop} on {dimension} is inverted")]
    InvertedRange { dimension: Dimension, start: u32, stop: u32 },
    #[error("delete ranges on {dimension} must be sorted by decreasing start")]
    UnsortedDeletes { dimension: Dimension },
    #[error("delete range {start}..{stop} on {dimension} overlaps its predecessor")]
    OverlappingDeletes { dimension: Dimension, start: u32, stop: u32 },
    #[error("write row {row} has {width} cells but only {columns} column numbers")]
    WriteWidth { row: usize, width: usize, columns: usize },
}
