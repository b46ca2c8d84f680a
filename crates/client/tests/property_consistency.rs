// Property-based test for window consistency across structural changes.
// CI: 128 cases (default). Soak: PROPTEST_CASES=5000 cargo test --release
//
// Every operation is submitted while the executor is held, so all of them are
// expressed in the grid's original coordinates and every later one has to be
// rewritten by the queue. The model tracks original rows by identity.

mod common;

use std::collections::HashSet;

use proptest::prelude::*;
use sheetwire_client::*;
use smol::future::Boxed;

use common::GatedExecutor;

const ROWS: u32 = 8;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    InsertRows(u32, u32),
    DeleteRows(u32, u32),
    InsertColumns(u32, u32),
    Write(u32),
    Read(u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (1..=ROWS + 1, 0..=3u32).prop_map(|(p, c)| Op::InsertRows(p, c)),
        2 => (1..=ROWS, 0..=3u32).prop_map(|(p, c)| Op::DeleteRows(p, c.min(ROWS + 1 - p))),
        1 => (1..=3u32, 1..=2u32).prop_map(|(p, c)| Op::InsertColumns(p, c)),
        2 => (1..=ROWS).prop_map(Op::Write),
        2 => (1..=ROWS).prop_map(Op::Read),
    ]
}

/// Original rows by position, `None` once deleted.
struct Model {
    rows: Vec<Option<String>>,
}

impl Model {
    fn new() -> Self {
        Self { rows: (1..=ROWS).map(|r| Some(format!("o{}", r))).collect() }
    }

    fn get(&self, row: u32) -> Option<String> {
        self.rows[row as usize - 1].clone()
    }

    fn write(&mut self, row: u32, value: String) {
        if let Some(slot) = self.rows[row as usize - 1].as_mut() {
            *slot = value;
        }
    }

    fn delete(&mut self, position: u32, count: u32) {
        for row in position..position + count {
            self.rows[row as usize - 1] = None;
        }
    }

    /// Surviving values, top to bottom.
    fn survivors(&self) -> Vec<String> {
        self.rows.iter().flatten().cloned().collect()
    }
}

fn original_grid() -> MemoryGrid {
    MemoryGrid::from_rows((1..=ROWS).map(|r| vec![CellValue::from(format!("o{}", r))]).collect())
}

/// Non-empty cells of a row, joined.
fn row_text(cells: &[CellValue]) -> String {
    cells.iter().filter(|c| !c.is_empty()).map(|c| c.to_string()).collect()
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn rows_keep_their_identity(ops in prop::collection::vec(arb_op(), 1..20)) {
        let grid = original_grid();
        let (executor, gate, probe) = GatedExecutor::new(grid.clone());
        let client = SheetClient::new(executor);
        let mut model = Model::new();

        // Reads racing a write to the same row have no defined outcome
        let written: HashSet<u32> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(row) => Some(*row),
                _ => None,
            })
            .collect();
        let mut seen_writes = HashSet::new();

        let mut updates: Vec<Boxed<Result<(), PipelineError>>> = Vec::new();
        let mut reads = Vec::new();

        for op in &ops {
            match *op {
                Op::InsertRows(p, c) => updates.push(Box::pin(client.insert_rows(p, Some(c)))),
                Op::DeleteRows(p, c) => {
                    model.delete(p, c);
                    updates.push(Box::pin(client.delete_rows(p, Some(c))));
                }
                Op::InsertColumns(p, c) => updates.push(Box::pin(client.insert_columns(p, Some(c)))),
                Op::Write(row) => {
                    if !seen_writes.insert(row) {
                        continue;
                    }
                    let value = format!("w{}", row);
                    model.write(row, value.clone());
                    let write = client.write_rows(row, vec![Some(vec![CellValue::from(value)])]);
                    updates.push(Box::pin(async move { write.await.map(|_| ()) }));
                }
                Op::Read(row) => {
                    if written.contains(&row) {
                        continue;
                    }
                    reads.push((row, model.get(row), client.read_rows(Some(row), Some(row + 1))));
                }
            }
        }

        gate.open();
        for update in updates {
            prop_assert!(smol::block_on(update).is_ok());
        }
        for (row, expected, read) in reads {
            let data = smol::block_on(read).unwrap();
            match expected {
                Some(value) => {
                    prop_assert_eq!(data.rows.len(), 1, "row {} should still exist", row);
                    prop_assert_eq!(row_text(&data.rows[0]), value);
                }
                None => prop_assert!(data.rows.is_empty(), "row {} was deleted", row),
            }
        }

        let actual: Vec<String> = grid
            .snapshot()
            .iter()
            .map(|cells| row_text(cells))
            .filter(|text| !text.is_empty())
            .collect();
        prop_assert_eq!(actual, model.survivors());
        prop_assert_eq!(probe.violations(), 0);
    }
}
