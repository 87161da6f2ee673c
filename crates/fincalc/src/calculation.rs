//! Recalculation planning
//!
//! Every request rebuilds the dependency graph from the caller's snapshot.
//! Nothing is patched incrementally and nothing is kept between calls, so
//! two identical requests always give identical answers.
//!
//! # Example
//!
//! ```rust
//! use fincalc::prelude::*;
//! use rust_decimal::Decimal;
//!
//! let a1 = CellReference::parse("A1").unwrap();
//! let b1 = CellReference::parse("B1").unwrap();
//! let cells = vec![
//!     Cell::value(a1, Decimal::ONE),
//!     Cell::formula(b1, "=A1*2").with_value(Decimal::TWO),
//! ];
//!
//! let engine = FormulaEngine::new();
//! let result = engine.recalculate_dependents("A1", Decimal::TEN, &cells).unwrap();
//! assert_eq!(result.updated.get(&b1), Some(&Decimal::from(20)));
//! ```

use crate::engine::FormulaEngine;
use fincalc_core::{Cell, CellReference};
use fincalc_formula::{
    evaluate, extract_dependencies, DependencyGraph, EvaluationContext, FormulaError,
    FormulaExpr, FormulaResult,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of recalculating the dependents of a changed cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recalculation {
    /// Cells whose new value differs from the value in the snapshot
    ///
    /// The changed cell itself is not listed; the caller already knows it.
    pub updated: BTreeMap<CellReference, Decimal>,
    /// Cells that evaluated to an error, including errors inherited from
    /// an input cell
    pub errors: BTreeMap<CellReference, FormulaError>,
    /// Number of formulas evaluated
    pub evaluated: usize,
}

impl Recalculation {
    /// Whether nothing changed and nothing failed
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.errors.is_empty()
    }
}

/// A cell snapshot with its formulas parsed and its graph built
pub(crate) struct Snapshot<'a> {
    /// Latest row for each reference
    pub(crate) cells: BTreeMap<CellReference, &'a Cell>,
    /// Parsed formulas that take part in the graph
    pub(crate) formulas: BTreeMap<CellReference, Arc<FormulaExpr>>,
    pub(crate) graph: DependencyGraph,
}

impl<'a> Snapshot<'a> {
    /// Build a snapshot, optionally replacing one cell's formula
    ///
    /// A later row for the same reference overrides an earlier one. A stored
    /// formula that no longer parses, or reads a range over the size limit,
    /// contributes no edges and is never recalculated. The replacement
    /// formula gets no such leniency: its errors are returned.
    pub(crate) fn build(
        engine: &FormulaEngine,
        rows: &'a [Cell],
        replacement: Option<(CellReference, Arc<FormulaExpr>)>,
    ) -> FormulaResult<Self> {
        let mut cells = BTreeMap::new();
        for row in rows {
            if cells.insert(row.reference, row).is_some() {
                warn!(cell = %row.reference, "duplicate cell reference in snapshot, later row wins");
            }
        }

        let mut formulas = BTreeMap::new();
        for (reference, cell) in &cells {
            let Some(text) = cell.formula_text() else {
                continue;
            };
            match engine.parse(text) {
                Ok(expr) => {
                    formulas.insert(*reference, expr);
                }
                Err(e) => {
                    warn!(cell = %reference, error = %e, "skipping unparseable formula");
                }
            }
        }

        let mut graph = DependencyGraph::new();
        formulas.retain(|reference, expr| {
            if replacement.as_ref().is_some_and(|(target, _)| target == reference) {
                return false;
            }
            match extract_dependencies(expr, engine.options()) {
                Ok(inputs) => {
                    graph.add_formula(*reference, inputs);
                    true
                }
                Err(e) => {
                    warn!(cell = %reference, error = %e, "skipping formula with unreadable inputs");
                    false
                }
            }
        });

        if let Some((reference, expr)) = replacement {
            let inputs = extract_dependencies(&expr, engine.options())?;
            graph.add_formula(reference, inputs);
            formulas.insert(reference, expr);
        }

        Ok(Self {
            cells,
            formulas,
            graph,
        })
    }

    /// Formulas to recompute after `changed` changes, in evaluation order
    pub(crate) fn plan(&self, changed: &CellReference) -> FormulaResult<Vec<CellReference>> {
        let order = self.graph.recalculation_order(changed)?;
        debug!(
            changed = %changed,
            cells = self.cells.len(),
            formulas = self.formulas.len(),
            nodes = self.graph.len(),
            planned = order.len(),
            "built recalculation plan"
        );
        Ok(order)
    }

    /// Evaluate `order` starting from the snapshot values with `changed`
    /// set to `new_value`
    pub(crate) fn recalculate(
        &self,
        engine: &FormulaEngine,
        changed: CellReference,
        new_value: Decimal,
        order: &[CellReference],
    ) -> Recalculation {
        let mut values: HashMap<CellReference, FormulaResult<Decimal>> = self
            .cells
            .iter()
            .map(|(reference, cell)| (*reference, Ok(cell.value)))
            .collect();
        values.insert(changed, Ok(new_value));

        let mut result = Recalculation::default();

        for reference in order {
            let Some(expr) = self.formulas.get(reference) else {
                continue;
            };

            let value = {
                let ctx = EvaluationContext::new(&values, engine.options());
                evaluate(expr, &ctx)
            };

            match &value {
                Ok(new) => {
                    let prior = self.cells.get(reference).map(|cell| cell.value);
                    if prior != Some(*new) {
                        result.updated.insert(*reference, *new);
                    }
                }
                Err(e) => {
                    debug!(cell = %reference, error = %e, "formula evaluated to an error");
                    result.errors.insert(*reference, e.clone());
                }
            }

            values.insert(*reference, value);
            result.evaluated += 1;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(a1: &str) -> CellReference {
        CellReference::parse(a1).unwrap()
    }

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_duplicate_rows_later_wins() {
        let rows = vec![
            Cell::formula(cell("B1"), "=A1*2"),
            Cell::formula(cell("B1"), "=A2*2"),
        ];
        let engine = FormulaEngine::new();
        let snapshot = Snapshot::build(&engine, &rows, None).unwrap();

        assert_eq!(snapshot.cells.len(), 1);
        assert_eq!(snapshot.plan(&cell("A1")).unwrap(), Vec::new());
        assert_eq!(snapshot.plan(&cell("A2")).unwrap(), vec![cell("B1")]);
    }

    #[test]
    fn test_unparseable_formula_is_skipped() {
        let rows = vec![
            Cell::value(cell("A1"), d(1)),
            Cell::formula(cell("B1"), "=A1+"),
            Cell::formula(cell("C1"), "=A1*3"),
        ];
        let engine = FormulaEngine::new();
        let snapshot = Snapshot::build(&engine, &rows, None).unwrap();

        assert_eq!(snapshot.formulas.len(), 1);
        assert_eq!(snapshot.plan(&cell("A1")).unwrap(), vec![cell("C1")]);
    }

    #[test]
    fn test_oversized_range_formula_is_skipped() {
        let rows = vec![
            Cell::value(cell("A1"), d(1)),
            Cell::formula(cell("B1"), "=SUM(A1:A1000)"),
            Cell::formula(cell("C1"), "=A1*3").with_value(d(3)),
        ];
        let engine = FormulaEngine::with_options(fincalc_formula::FormulaOptions {
            max_range_cells: 100,
            ..Default::default()
        });
        let snapshot = Snapshot::build(&engine, &rows, None).unwrap();

        assert_eq!(snapshot.formulas.len(), 1);
        assert!(!snapshot.formulas.contains_key(&cell("B1")));
        let order = snapshot.plan(&cell("A1")).unwrap();
        assert_eq!(order, vec![cell("C1")]);

        let result = snapshot.recalculate(&engine, cell("A1"), d(2), &order);
        assert_eq!(result.updated.get(&cell("C1")), Some(&d(6)));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_oversized_replacement_is_an_error() {
        let rows = vec![Cell::formula(cell("B1"), "=SUM(A1:A1000)")];
        let engine = FormulaEngine::with_options(fincalc_formula::FormulaOptions {
            max_range_cells: 100,
            ..Default::default()
        });

        let expr = engine.parse("=SUM(A1:A1000)").unwrap();
        assert!(matches!(
            Snapshot::build(&engine, &rows, Some((cell("C1"), expr))),
            Err(FormulaError::LimitExceeded(_))
        ));

        // replacing the oversized formula with a small one clears it
        let expr = engine.parse("=A1").unwrap();
        let snapshot = Snapshot::build(&engine, &rows, Some((cell("B1"), expr))).unwrap();
        assert_eq!(snapshot.plan(&cell("A1")).unwrap(), vec![cell("B1")]);
    }

    #[test]
    fn test_blank_formula_is_a_value() {
        let rows = vec![Cell {
            reference: cell("B1"),
            value: d(4),
            formula: Some("  ".into()),
        }];
        let engine = FormulaEngine::new();
        let snapshot = Snapshot::build(&engine, &rows, None).unwrap();
        assert!(snapshot.formulas.is_empty());
        assert!(snapshot.graph.is_empty());
    }

    #[test]
    fn test_unchanged_values_are_not_reported() {
        let rows = vec![
            Cell::value(cell("A1"), d(1)),
            Cell::value(cell("A2"), d(5)),
            Cell::formula(cell("B1"), "=A1*2").with_value(d(2)),
            Cell::formula(cell("B2"), "=A2").with_value(d(5)),
            Cell::formula(cell("C1"), "=B1+B2").with_value(d(7)),
        ];
        let engine = FormulaEngine::new();
        let snapshot = Snapshot::build(&engine, &rows, None).unwrap();
        let order = snapshot.plan(&cell("A2")).unwrap();
        let result = snapshot.recalculate(&engine, cell("A2"), d(5), &order);

        assert_eq!(order, vec![cell("B2"), cell("C1")]);
        assert_eq!(result.evaluated, 2);
        assert!(result.is_empty());
    }
}
