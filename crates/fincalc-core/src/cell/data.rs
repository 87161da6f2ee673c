//! Caller-owned cell rows

use super::CellReference;
use rust_decimal::Decimal;

/// One cell of a sheet snapshot, as supplied by the caller
///
/// `value` holds the last known value. For formula cells this is the value
/// computed on the previous recalculation; it is what dependents see until
/// the cell is recomputed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Where the cell lives
    pub reference: CellReference,
    /// Current value
    pub value: Decimal,
    /// Formula text (e.g., "=SUM(A1:A5)"), if the cell is calculated
    #[cfg_attr(feature = "serde", serde(default))]
    pub formula: Option<String>,
}

impl Cell {
    /// Create a plain value cell
    pub fn value(reference: CellReference, value: Decimal) -> Self {
        Self {
            reference,
            value,
            formula: None,
        }
    }

    /// Create a formula cell whose last computed value is zero
    pub fn formula<S: Into<String>>(reference: CellReference, formula: S) -> Self {
        Self {
            reference,
            value: Decimal::ZERO,
            formula: Some(formula.into()),
        }
    }

    /// Set the last computed value
    pub fn with_value(mut self, value: Decimal) -> Self {
        self.value = value;
        self
    }

    /// The formula text, unless it is missing or blank
    pub fn formula_text(&self) -> Option<&str> {
        self.formula
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Whether the cell holds a formula
    pub fn is_calculated(&self) -> bool {
        self.formula_text().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_formula_is_a_value_cell() {
        let a1 = CellReference::new(0, 0);
        let cell = Cell {
            reference: a1,
            value: Decimal::ONE,
            formula: Some("   ".into()),
        };
        assert!(!cell.is_calculated());
        assert_eq!(cell.formula_text(), None);

        let cell = Cell::formula(a1, "=B1*2").with_value(Decimal::TEN);
        assert!(cell.is_calculated());
        assert_eq!(cell.formula_text(), Some("=B1*2"));
        assert_eq!(cell.value, Decimal::TEN);
    }
}
