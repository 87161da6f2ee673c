//! Convenient re-exports
//!
//! ```rust
//! use fincalc::prelude::*;
//! ```

pub use crate::{
    // Cell types
    Cell,
    CellError,
    CellRange,
    CellReference,
    // Values
    CellValues,
    // Engine
    FormulaEngine,
    // Errors
    FormulaError,
    FormulaOptions,
    FormulaResult,
    IntoCellReference,
    ParseCache,
    Recalculation,
    Validation,
};
