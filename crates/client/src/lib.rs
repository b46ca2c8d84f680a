//! Request pipeline for a remote, structurally mutable grid.
//!
//! Application code talks to a [`SheetClient`]. Every call builds one
//! [`Request`] and hands it to the [`RequestQueue`], which serializes
//! structural operations against reads and writes and, whenever an insertion
//! or deletion completes, rewrites every still-queued request so it keeps
//! addressing the same logical cells.
//!
//! The grid itself sits behind the [`GridExecutor`] trait. [`MemoryGrid`] is
//! an in-process implementation; `sheetwire-remote` provides an HTTP one.

mod client;
mod error;
mod events;
mod executor;
mod memory;
mod queue;
pub mod transform;

pub use client::{ColumnSelection, SheetClient, Table};
pub use error::PipelineError;
pub use events::{EventCollector, StructuralChangeObserver};
pub use executor::{ExecuteFuture, ExecutorError, GridExecutor};
pub use memory::MemoryGrid;
pub use queue::RequestQueue;

pub use sheetwire_core::{CellValue, LogicalWindow, Orientation};
pub use sheetwire_protocol::{
    ChangeKind, ContractError, DataBlock, DeleteRange, Dimension, HeaderNode, InsertSpec,
    ReadData, ReadSpec, Request, RequestKind, Response, StructuralChange, WriteData,
};
