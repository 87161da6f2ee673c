//! # fincalc
//!
//! A spreadsheet formula engine over decimal numbers.
//!
//! fincalc parses `=`-prefixed formulas in the familiar A1 grammar, tracks
//! which cells read which, rejects circular references and recomputes the
//! dependents of a changed cell in a reproducible order. It works on a
//! snapshot of cells supplied by the caller and never stores anything.
//!
//! ## Features
//!
//! - Arithmetic, comparison and percent operators with spreadsheet precedence
//! - `SUM`, `AVERAGE`, `MIN`, `MAX`, `COUNT`, `IF`, `ROUND` and `ABS`
//! - Base-10 arithmetic throughout (no binary floating point)
//! - Sticky error values that propagate to dependent cells
//! - An optional parse cache that can be shared across threads
//!
//! ## Example
//!
//! ```rust
//! use fincalc::prelude::*;
//! use rust_decimal::Decimal;
//!
//! let engine = FormulaEngine::new();
//!
//! let cells = vec![
//!     Cell::value("A1".parse().unwrap(), Decimal::ONE),
//!     Cell::formula("B1".parse().unwrap(), "=A1*2").with_value(Decimal::TWO),
//!     Cell::formula("C1".parse().unwrap(), "=B1+1").with_value(Decimal::from(3)),
//! ];
//!
//! // Validate and check an edit before accepting it
//! assert!(engine.validate_formula("=SUM(A1:A5)").is_valid);
//! assert!(engine.would_create_circular_dependency("A1", "=C1+1", &cells).unwrap());
//!
//! // Recompute downstream cells after A1 changes
//! let result = engine.recalculate_dependents("A1", Decimal::TEN, &cells).unwrap();
//! let updated: Vec<String> = result
//!     .updated
//!     .iter()
//!     .map(|(cell, value)| format!("{cell}={value}"))
//!     .collect();
//! assert_eq!(updated, ["B1=20", "C1=21"]);
//! ```

pub mod calculation;
pub mod engine;
pub mod prelude;

pub use calculation::Recalculation;
pub use engine::{FormulaEngine, IntoCellReference, Validation};

// Re-export core types
pub use fincalc_core::{
    Cell, CellError, CellRange, CellRangeIterator, CellReference, Error, Result, MAX_COLS,
    MAX_ROWS,
};

// Re-export formula types
pub use fincalc_formula::{
    evaluate, extract_dependencies, parse_formula, reference_tokens, BinaryOperator,
    CellValues, DependencyGraph, Direction, EvaluationContext, FormulaError, FormulaExpr,
    FormulaOptions, FormulaResult, Function, ParseCache, ParseLimits, UnaryOperator,
    DEFAULT_MAX_EXPRESSION_DEPTH, DEFAULT_MAX_FORMULA_LENGTH, DEFAULT_MAX_NESTING_DEPTH,
    DEFAULT_MAX_RANGE_CELLS,
};
