//! Client facade.
//!
//! Each operation builds exactly one request from the current window and
//! queues it immediately; the returned future resolves once the executor
//! has answered. Coordinates are absolute grid positions.

use std::future::Future;
use std::sync::Arc;

use sheetwire_config::Settings;
use sheetwire_core::{CellValue, LogicalWindow};
use sheetwire_protocol::{
    DataBlock, DeleteRange, HeaderNode, InsertSpec, ReadData, ReadSpec, Request, Response, WriteData,
};

use crate::error::PipelineError;
use crate::events::StructuralChangeObserver;
use crate::executor::GridExecutor;
use crate::queue::{Extension, RequestQueue};

/// Which top-level columns `read_table` returns data for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    #[default]
    All,
    /// Headers only.
    None,
    /// Columns by top-level header label, in this order.
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<HeaderNode>,
    /// Absent when no columns were selected.
    pub data: Option<DataBlock>,
}

/// Handle to one logical client. Clones share the queue and window.
#[derive(Clone)]
pub struct SheetClient {
    queue: Arc<RequestQueue>,
}

impl SheetClient {
    /// Client over the whole grid.
    pub fn new(executor: impl GridExecutor) -> Self {
        Self::with_window(executor, LogicalWindow::default())
    }

    pub fn with_window(executor: impl GridExecutor, window: LogicalWindow) -> Self {
        Self { queue: RequestQueue::new(Arc::new(executor), window, None) }
    }

    pub fn from_settings(executor: impl GridExecutor, settings: &Settings) -> Self {
        Self {
            queue: RequestQueue::new(
                Arc::new(executor),
                settings.window.to_window(),
                settings.dispatch.max_in_flight,
            ),
        }
    }

    pub fn window(&self) -> LogicalWindow {
        self.queue.window()
    }

    /// Register an observer for structural changes. Observers run after the
    /// window and the queued requests have been rewritten.
    pub fn subscribe(&self, observer: Arc<dyn StructuralChangeObserver>) {
        self.queue.subscribe(observer);
    }

    /// Queue a hand-built request.
    pub fn enqueue(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, PipelineError>> + Send + 'static {
        self.queue.enqueue(request)
    }

    pub fn pending_requests(&self) -> Vec<Request> {
        self.queue.pending_requests()
    }

    /// `(structural, read/write)` requests in flight.
    pub fn in_flight(&self) -> (usize, usize) {
        self.queue.in_flight()
    }

    /// Read the header tree and, unless `columns` is `None`, the data below it.
    pub fn read_table(
        &self,
        columns: ColumnSelection,
    ) -> impl Future<Output = Result<Table, PipelineError>> + Send + 'static {
        let read_data = match columns {
            ColumnSelection::All => Some(ReadData::Flag(true)),
            ColumnSelection::None => None,
            ColumnSelection::Named(names) => Some(ReadData::Spec(ReadSpec {
                col_headers: Some(names),
                ..ReadSpec::default()
            })),
        };
        let response = self.queue.enqueue(Request {
            limit: Some(self.window()),
            read_headers: true,
            read_data,
            ..Request::default()
        });

        async move {
            let response = response.await?;
            Ok(Table {
                headers: response.headers.unwrap_or_default(),
                data: response.data,
            })
        }
    }

    /// Read rows `[row_start, row_stop)` of the window, without headers.
    pub fn read_rows(
        &self,
        row_start: Option<u32>,
        row_stop: Option<u32>,
    ) -> impl Future<Output = Result<DataBlock, PipelineError>> + Send + 'static {
        let limit = self.window().crop(row_start, row_stop, None, None);
        let response = self.queue.enqueue(Request {
            limit: Some(limit),
            read_data: Some(ReadData::Spec(ReadSpec {
                row_start: Some(limit.row_start),
                row_stop: limit.row_stop,
                ..ReadSpec::default()
            })),
            ..Request::default()
        });

        async move {
            let data = response.await?.data.unwrap_or_default();
            if data.col_numbers.is_empty() {
                return Err(PipelineError::DataIntegrity(
                    "executor returned no columns for the window".to_string(),
                ));
            }
            Ok(data)
        }
    }

    /// Write a block of rows starting at `row_start`. `None` rows are left
    /// as they are.
    ///
    /// Leading empty rows are dropped, since the first transmitted row sets
    /// the block's width. Resolves to `false` without contacting the
    /// executor when nothing is left to write.
    pub fn write_rows(
        &self,
        row_start: u32,
        rows: Vec<Option<Vec<CellValue>>>,
    ) -> impl Future<Output = Result<bool, PipelineError>> + Send + 'static {
        let skip = rows
            .iter()
            .take_while(|row| row.as_ref().map_or(true, Vec::is_empty))
            .count();
        let pending = (skip < rows.len()).then(|| {
            let rows = rows.into_iter().skip(skip).collect();
            self.queue.enqueue(Request {
                limit: Some(self.window()),
                write_data: Some(WriteData {
                    col_numbers: None,
                    row_start: row_start + skip as u32,
                    rows,
                }),
                ..Request::default()
            })
        });

        async move {
            match pending {
                Some(response) => Ok(response.await?.wrote_data),
                None => Ok(false),
            }
        }
    }

    /// Insert `count` (default 1) blank rows before `position`.
    pub fn insert_rows(
        &self,
        position: u32,
        count: Option<u32>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        self.structural(Request {
            insert_rows: Some(InsertSpec { position, count }),
            ..Request::default()
        })
    }

    pub fn insert_columns(
        &self,
        position: u32,
        count: Option<u32>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        self.structural(Request {
            insert_columns: Some(InsertSpec { position, count }),
            ..Request::default()
        })
    }

    /// Delete `count` (default 1) rows starting at `position`.
    pub fn delete_rows(
        &self,
        position: u32,
        count: Option<u32>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        self.structural(Request {
            delete_rows: vec![DeleteRange::new(position, count.unwrap_or(1))],
            ..Request::default()
        })
    }

    pub fn delete_columns(
        &self,
        position: u32,
        count: Option<u32>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        self.structural(Request {
            delete_columns: vec![DeleteRange::new(position, count.unwrap_or(1))],
            ..Request::default()
        })
    }

    /// Grow the window to the given stops by inserting at its stops.
    ///
    /// The stops are read when the request is dispatched, after every
    /// structural request queued before it. Bounds that do not exceed the
    /// window by then, or an unbounded axis, are left alone.
    pub fn extend(
        &self,
        row_stop: Option<u32>,
        col_stop: Option<u32>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        let response = self.queue.enqueue_extension(Extension { row_stop, col_stop });
        async move {
            response.await?;
            Ok(())
        }
    }

    fn structural(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send + 'static {
        let response = self.queue.enqueue(request);
        async move {
            response.await?;
            Ok(())
        }
    }
}
