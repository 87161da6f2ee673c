//! Engine configuration

use crate::error::{FormulaError, FormulaResult};
use fincalc_core::CellRange;
use rust_decimal::{Decimal, RoundingStrategy};

/// Default cap on parser recursion (parentheses, function calls, prefix signs)
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Default cap on expression tree depth, counting operator chains
pub const DEFAULT_MAX_EXPRESSION_DEPTH: usize = 512;

/// Default cap on formula length in characters (the spreadsheet limit)
pub const DEFAULT_MAX_FORMULA_LENGTH: usize = 8192;

/// Default cap on the number of cells a single range may expand to
pub const DEFAULT_MAX_RANGE_CELLS: u64 = 100_000;

/// Options for parsing, evaluation and recalculation
///
/// Arithmetic always runs at full [`Decimal`] precision (28 significant
/// digits). Nothing is rounded inside the engine except by `ROUND`;
/// [`FormulaOptions::format_value`] applies display rounding for callers.
#[derive(Debug, Clone, Copy)]
pub struct FormulaOptions {
    /// Maximum parser nesting depth
    pub max_nesting_depth: usize,
    /// Maximum depth of a parsed expression tree
    pub max_expression_depth: usize,
    /// Maximum formula length in characters
    pub max_formula_length: usize,
    /// Maximum number of cells one range reference may cover
    pub max_range_cells: u64,
    /// Rounding used by the ROUND function (default: half away from zero)
    pub round_strategy: RoundingStrategy,
    /// Rounding used when formatting values for display (default: banker's)
    pub display_strategy: RoundingStrategy,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
            max_formula_length: DEFAULT_MAX_FORMULA_LENGTH,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            round_strategy: RoundingStrategy::MidpointAwayFromZero,
            display_strategy: RoundingStrategy::MidpointNearestEven,
        }
    }
}

impl FormulaOptions {
    /// The subset of options that affects parsing
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_nesting_depth: self.max_nesting_depth,
            max_expression_depth: self.max_expression_depth,
            max_formula_length: self.max_formula_length,
        }
    }

    /// Reject a range covering more cells than `max_range_cells`
    pub fn check_range(&self, range: &CellRange) -> FormulaResult<()> {
        let count = range.cell_count();
        if count > self.max_range_cells {
            return Err(FormulaError::LimitExceeded(format!(
                "range {} covers {} cells (limit {})",
                range, count, self.max_range_cells
            )));
        }
        Ok(())
    }

    /// Format a value with a fixed number of decimal places
    ///
    /// ```
    /// use fincalc_formula::FormulaOptions;
    /// use rust_decimal::Decimal;
    ///
    /// let options = FormulaOptions::default();
    /// assert_eq!(options.format_value(Decimal::new(2345, 3), 2), "2.34");
    /// assert_eq!(options.format_value(Decimal::new(5, 0), 2), "5.00");
    /// ```
    pub fn format_value(&self, value: Decimal, places: u32) -> String {
        let rounded = value.round_dp_with_strategy(places, self.display_strategy);
        format!("{:.*}", places as usize, rounded)
    }
}

/// Limits applied while parsing formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParseLimits {
    /// Maximum parser nesting depth
    pub max_nesting_depth: usize,
    /// Maximum depth of the resulting tree
    ///
    /// Evaluation recurses once per level, so this bounds its stack use.
    pub max_expression_depth: usize,
    /// Maximum formula length in characters
    pub max_formula_length: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        FormulaOptions::default().parse_limits()
    }
}
