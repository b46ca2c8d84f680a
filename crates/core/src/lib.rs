//! Core types shared by every sheetwire crate.
//!
//! Pure data: logical windows over the grid and the scalar cell values that
//! travel in read and write payloads. No I/O lives here.

pub mod value;
pub mod window;

pub use value::CellValue;
pub use window::{LogicalWindow, Orientation};
