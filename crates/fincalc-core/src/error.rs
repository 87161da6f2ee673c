//! Error types for fincalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fincalc-core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid cell reference format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row number out of bounds
    #[error("Row number {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column letters out of bounds
    #[error("Column {0} out of bounds (max: XFD)")]
    ColumnOutOfBounds(String),
}
