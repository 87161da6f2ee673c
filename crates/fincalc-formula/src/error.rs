//! Formula error types

use fincalc_core::{CellError, CellReference};
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing, evaluation or recalculation
///
/// Errors are values: a cell whose formula fails to evaluate holds its error,
/// and any formula reading that cell fails with the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// Malformed formula text; `offset` is the character position in the
    /// text as supplied (including any leading '=')
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Function name not in the built-in table
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A range used where a single value is required
    #[error("Range {0} cannot be used where a single value is expected")]
    InvalidRangeUsage(String),

    /// Wrong number or kind of arguments to a function
    #[error("Invalid argument for {function}: {message}")]
    Argument { function: String, message: String },

    /// Division by zero
    #[error("Division by zero")]
    DivideByZero,

    /// Arithmetic with no defined decimal result (overflow, negative base
    /// with a fractional exponent, ...)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A dependency cycle; carries one cell on the cycle
    #[error("Circular dependency involving cell {0}")]
    CircularDependency(CellReference),

    /// A reference that does not resolve to a valid cell or range
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A configured resource limit was hit (range size, nesting depth, length)
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

impl FormulaError {
    /// Create a syntax error at a character offset
    pub fn syntax<S: Into<String>>(offset: usize, message: S) -> Self {
        FormulaError::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Create an argument error for a function
    pub fn argument<F: Into<String>, S: Into<String>>(function: F, message: S) -> Self {
        FormulaError::Argument {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-operation error
    pub fn invalid_operation<S: Into<String>>(message: S) -> Self {
        FormulaError::InvalidOperation(message.into())
    }

    /// Spreadsheet display code for this error
    pub fn code(&self) -> CellError {
        match self {
            FormulaError::Syntax { .. } | FormulaError::LimitExceeded(_) => CellError::Syntax,
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::InvalidRangeUsage(_) | FormulaError::Argument { .. } => {
                CellError::Value
            }
            FormulaError::DivideByZero => CellError::Div0,
            FormulaError::InvalidOperation(_) => CellError::Num,
            FormulaError::CircularDependency(_) => CellError::Circ,
            FormulaError::UnresolvedReference(_) => CellError::Ref,
        }
    }
}

impl From<fincalc_core::Error> for FormulaError {
    fn from(err: fincalc_core::Error) -> Self {
        FormulaError::UnresolvedReference(err.to_string())
    }
}
