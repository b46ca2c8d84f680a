//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use sheetwire_client::{
    CellValue, ExecuteFuture, ExecutorError, GridExecutor, MemoryGrid, Request, RequestKind,
};
use smol::channel::{Receiver, Sender};

/// Grid where cell (r, c) holds `r{r}c{c}`.
pub fn labelled(rows: u32, cols: u32) -> MemoryGrid {
    MemoryGrid::from_rows(
        (1..=rows)
            .map(|r| (1..=cols).map(|c| CellValue::from(format!("r{}c{}", r, c))).collect())
            .collect(),
    )
}

pub fn text(rows: &[Vec<CellValue>]) -> Vec<Vec<String>> {
    rows.iter().map(|row| row.iter().map(|c| c.to_string()).collect()).collect()
}

/// Holds executor responses until released.
pub struct Gate {
    tx: Mutex<Option<Sender<()>>>,
}

impl Gate {
    /// Let `n` more requests through.
    pub fn release(&self, n: usize) {
        if let Some(tx) = self.tx.lock().as_ref() {
            for _ in 0..n {
                let _ = tx.try_send(());
            }
        }
    }

    /// Let everything through from now on.
    pub fn open(&self) {
        self.tx.lock().take();
    }
}

/// Records what reached the executor and checks the dispatch policy.
#[derive(Default)]
pub struct Probe {
    state: Mutex<ProbeState>,
}

#[derive(Default)]
struct ProbeState {
    log: Vec<Request>,
    structural: usize,
    other: usize,
    max_other: usize,
    violations: usize,
}

impl Probe {
    fn begin(&self, request: &Request) {
        let mut state = self.state.lock();
        state.log.push(request.clone());
        if request.kind() == RequestKind::Structural {
            if state.structural > 0 || state.other > 0 {
                state.violations += 1;
            }
            state.structural += 1;
        } else {
            if state.structural > 0 {
                state.violations += 1;
            }
            state.other += 1;
            state.max_other = state.max_other.max(state.other);
        }
    }

    fn end(&self, request: &Request) {
        let mut state = self.state.lock();
        if request.kind() == RequestKind::Structural {
            state.structural -= 1;
        } else {
            state.other -= 1;
        }
    }

    /// Requests in the order they reached the executor, as sent.
    pub fn log(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    /// Block until `n` requests have reached the executor.
    pub fn wait_for_started(&self, n: usize) {
        for _ in 0..5_000 {
            if self.state.lock().log.len() >= n {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("only {} requests reached the executor", self.state.lock().log.len());
    }

    pub fn violations(&self) -> usize {
        self.state.lock().violations
    }

    pub fn max_concurrent_reads_writes(&self) -> usize {
        self.state.lock().max_other
    }
}

type FailWhen = Box<dyn Fn(&Request) -> bool + Send + Sync>;

/// `MemoryGrid` behind a gate, instrumented with a [`Probe`].
pub struct GatedExecutor {
    grid: MemoryGrid,
    gate: Receiver<()>,
    probe: Arc<Probe>,
    fail_when: Option<FailWhen>,
}

impl GatedExecutor {
    /// Starts closed.
    pub fn new(grid: MemoryGrid) -> (Self, Arc<Gate>, Arc<Probe>) {
        let (tx, rx) = smol::channel::unbounded();
        let probe = Arc::new(Probe::default());
        let executor = Self { grid, gate: rx, probe: probe.clone(), fail_when: None };
        (executor, Arc::new(Gate { tx: Mutex::new(Some(tx)) }), probe)
    }

    /// Never blocks.
    pub fn open(grid: MemoryGrid) -> (Self, Arc<Probe>) {
        let (executor, gate, probe) = Self::new(grid);
        gate.open();
        (executor, probe)
    }

    /// Fail matching requests with a transport error, leaving the grid as is.
    pub fn failing(mut self, when: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(when));
        self
    }
}

impl GridExecutor for GatedExecutor {
    fn execute(&self, request: Request) -> ExecuteFuture {
        let grid = self.grid.clone();
        let gate = self.gate.clone();
        let probe = self.probe.clone();
        let fail = self.fail_when.as_ref().is_some_and(|when| when(&request));

        probe.begin(&request);
        Box::pin(async move {
            // Closed channel means the gate is open
            let _ = gate.recv().await;
            let result = if fail {
                Err(ExecutorError::Transport("connection reset".to_string()))
            } else {
                grid.apply(&request)
            };
            probe.end(&request);
            result
        })
    }
}
