//! Coordinate rewriting.
//!
//! When an insertion or deletion completes, every request still waiting in
//! the queue was built against the old coordinate space. The functions here
//! rewrite a request (or a window) in place so it keeps addressing the same
//! logical cells. Pure mutation, no I/O, no failure modes.
//!
//! Rows and columns use the same rules:
//!
//! - Deletion of `[p, p+n)`: any boundary `v > p` drops by `min(n, v - p)`,
//!   so nothing that sat past the deleted span crosses below `p`.
//! - Insertion of `n` at `p`: start-like values `>= p` and stop values `> p`
//!   grow by `n`. A window ending exactly at `p` is not widened.
//! - A queued deletion straddling an insertion point is split so it never
//!   removes the freshly inserted cells.

use std::iter;

use sheetwire_core::LogicalWindow;
use sheetwire_protocol::{
    ChangeKind, DeleteRange, Dimension, InsertSpec, ReadData, Request, StructuralChange, WriteData,
};

/// Rewrite a window's bounds on the event's axis.
pub fn apply_to_window(event: &StructuralChange, window: &mut LogicalWindow) {
    if event.count == 0 {
        return;
    }
    let (start, stop) = match event.dimension {
        Dimension::Rows => (&mut window.row_start, &mut window.row_stop),
        Dimension::Columns => (&mut window.col_start, &mut window.col_stop),
    };
    shift_start(event, start);
    if let Some(stop) = stop {
        shift_stop(event, stop);
    }
}

/// Rewrite every coordinate-bearing field of a queued request.
pub fn apply_to_request(event: &StructuralChange, request: &mut Request) {
    if event.count == 0 {
        return;
    }

    // Write blocks are anchored on the limit as it was before this event.
    let limit = request.limit;
    if let Some(write) = request.write_data.as_mut() {
        apply_to_write(event, write, limit.as_ref());
    }
    if let Some(limit) = request.limit.as_mut() {
        apply_to_window(event, limit);
    }
    if let Some(read) = request.read_data.as_mut() {
        apply_to_read(event, read);
    }

    let (insert, deletes) = match event.dimension {
        Dimension::Rows => (&mut request.insert_rows, &mut request.delete_rows),
        Dimension::Columns => (&mut request.insert_columns, &mut request.delete_columns),
    };
    if let Some(insert) = insert.as_mut() {
        apply_to_insert(event, insert);
    }
    apply_to_deletes(event, deletes);
}

fn apply_to_read(event: &StructuralChange, read: &mut ReadData) {
    let ReadData::Spec(spec) = read else {
        return;
    };
    match event.dimension {
        Dimension::Rows => {
            if let Some(start) = spec.row_start.as_mut() {
                shift_start(event, start);
            }
            if let Some(stop) = spec.row_stop.as_mut() {
                shift_stop(event, stop);
            }
        }
        Dimension::Columns => {
            if let Some(cols) = spec.col_numbers.as_mut() {
                shift_positions(event, cols);
            }
        }
    }
}

fn apply_to_insert(event: &StructuralChange, insert: &mut InsertSpec) {
    shift_start(event, &mut insert.position);
}

fn apply_to_deletes(event: &StructuralChange, ranges: &mut Vec<DeleteRange>) {
    let StructuralChange { position, count, .. } = *event;
    match event.change {
        ChangeKind::Deleted => {
            for range in ranges.iter_mut() {
                clamp_down(position, count, &mut range.start);
                clamp_down(position, count, &mut range.stop);
            }
        }
        ChangeKind::Inserted => {
            let mut i = 0;
            while i < ranges.len() {
                let range = ranges[i];
                if range.start >= position {
                    ranges[i].start += count;
                    ranges[i].stop += count;
                } else if range.stop > position {
                    // Keep the lower part, move the upper part past the new
                    // cells. The array stays sorted by decreasing start, so
                    // the upper sibling goes first.
                    ranges[i].stop = position;
                    ranges.insert(
                        i,
                        DeleteRange {
                            start: position + count,
                            stop: range.stop + count,
                        },
                    );
                    i += 1;
                }
                i += 1;
            }
        }
    }
}

fn apply_to_write(event: &StructuralChange, write: &mut WriteData, limit: Option<&LogicalWindow>) {
    match event.dimension {
        Dimension::Rows => apply_to_write_rows(event, write),
        Dimension::Columns => apply_to_write_columns(event, write, limit),
    }
}

fn apply_to_write_rows(event: &StructuralChange, write: &mut WriteData) {
    let StructuralChange { position, count, .. } = *event;
    let len = write.rows.len() as u32;
    match event.change {
        ChangeKind::Deleted => {
            // Entries for rows that no longer exist are dropped
            if let Some((from, to)) = overlap(write.row_start, len, position, count) {
                write.rows.drain(from..to);
            }
            clamp_down(position, count, &mut write.row_start);
        }
        ChangeKind::Inserted => {
            if write.row_start >= position {
                write.row_start += count;
            } else if position < write.row_start + len {
                // New rows inside the block stay untouched
                let at = (position - write.row_start) as usize;
                write.rows.splice(at..at, iter::repeat(None).take(count as usize));
            }
        }
    }
}

fn apply_to_write_columns(event: &StructuralChange, write: &mut WriteData, limit: Option<&LogicalWindow>) {
    if let Some(cols) = write.col_numbers.as_mut() {
        let removed = shift_positions(event, cols);
        if !removed.is_empty() {
            for cells in write.rows.iter_mut().flatten() {
                for &index in removed.iter().rev() {
                    if index < cells.len() {
                        cells.remove(index);
                    }
                }
            }
        }
        return;
    }

    // Implicit columns: the block starts at the limit's first column and the
    // limit itself is rewritten separately.
    let StructuralChange { position, count, .. } = *event;
    let block_start = limit.map_or(1, |l| l.col_start);
    let width = write.width() as u32;
    match event.change {
        ChangeKind::Deleted => {
            if let Some((from, to)) = overlap(block_start, width, position, count) {
                for cells in write.rows.iter_mut().flatten() {
                    let to = to.min(cells.len());
                    if from < to {
                        cells.drain(from..to);
                    }
                }
            }
        }
        ChangeKind::Inserted => {
            let inside = position > block_start && position < block_start + width;
            let unanchored = limit.is_none() && position <= block_start && width > 0;
            if inside || unanchored {
                // Pin every cell to its column so the new columns are skipped
                let mut cols: Vec<u32> = (block_start..block_start + width).collect();
                shift_positions(event, &mut cols);
                write.col_numbers = Some(cols);
            }
        }
    }
}

/// Rewrite explicit cell positions. Positions inside a deleted span are
/// removed; their former indices are returned in ascending order.
fn shift_positions(event: &StructuralChange, positions: &mut Vec<u32>) -> Vec<usize> {
    let StructuralChange { position, count, .. } = *event;
    match event.change {
        ChangeKind::Inserted => {
            for v in positions.iter_mut() {
                if *v >= position {
                    *v += count;
                }
            }
            Vec::new()
        }
        ChangeKind::Deleted => {
            let end = position + count;
            let mut removed = Vec::new();
            let mut index = 0;
            positions.retain(|&v| {
                let keep = v < position || v >= end;
                if !keep {
                    removed.push(index);
                }
                index += 1;
                keep
            });
            for v in positions.iter_mut() {
                if *v >= end {
                    *v -= count;
                }
            }
            removed
        }
    }
}

fn shift_start(event: &StructuralChange, value: &mut u32) {
    match event.change {
        ChangeKind::Deleted => clamp_down(event.position, event.count, value),
        ChangeKind::Inserted => {
            if *value >= event.position {
                *value += event.count;
            }
        }
    }
}

fn shift_stop(event: &StructuralChange, value: &mut u32) {
    match event.change {
        ChangeKind::Deleted => clamp_down(event.position, event.count, value),
        ChangeKind::Inserted => {
            if *value > event.position {
                *value += event.count;
            }
        }
    }
}

fn clamp_down(position: u32, count: u32, value: &mut u32) {
    if *value > position {
        *value -= count.min(*value - position);
    }
}

/// Offsets `[from, to)` within a block of `len` entries starting at `start`
/// that fall inside the deleted span `[position, position+count)`.
fn overlap(start: u32, len: u32, position: u32, count: u32) -> Option<(usize, usize)> {
    let lo = start.max(position);
    let hi = (start + len).min(position + count);
    (lo < hi).then(|| ((lo - start) as usize, (hi - start) as usize))
}
