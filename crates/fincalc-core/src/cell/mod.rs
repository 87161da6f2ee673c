//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellReference`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangular range of cells (e.g., "A1:B10")
//! - [`Cell`] - A caller-supplied cell with its value and optional formula
//! - [`CellError`] - Spreadsheet error codes for errored cells

mod address;
mod data;
mod value;

pub use address::{CellRange, CellRangeIterator, CellReference};
pub use data::Cell;
pub use value::CellError;
