//! # fincalc-core
//!
//! Core data structures for the fincalc formula engine.
//!
//! This crate provides the fundamental types used throughout fincalc:
//! - [`CellReference`] and [`CellRange`] - Cell addressing and ranges
//! - [`Cell`] - A caller-owned cell (value plus optional formula)
//! - [`CellError`] - Spreadsheet error codes
//!
//! ## Example
//!
//! ```rust
//! use fincalc_core::{CellRange, CellReference};
//!
//! let range: CellRange = "A3:A1".parse().unwrap();
//! let cells: Vec<String> = range.cells().map(|c| c.to_string()).collect();
//! assert_eq!(cells, ["A1", "A2", "A3"]);
//!
//! let cell: CellReference = "b7".parse().unwrap();
//! assert_eq!(cell.to_string(), "B7");
//! ```

pub mod cell;
pub mod error;

// Re-exports for convenience
pub use cell::{Cell, CellError, CellRange, CellRangeIterator, CellReference};
pub use error::{Error, Result};

/// Maximum row number (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns (Excel limit)
pub const MAX_COLS: u16 = 16_384;
