//! The formula engine facade
//!
//! [`FormulaEngine`] bundles the options and an optional shared parse cache
//! and exposes every engine operation by name. It holds no mutable state of
//! its own, so one engine can serve many threads.

use crate::calculation::{Recalculation, Snapshot};
use fincalc_core::{Cell, CellRange, CellReference};
use fincalc_formula::{
    evaluate, extract_dependencies, parse_formula, reference_tokens, CellValues, Direction,
    EvaluationContext, FormulaError, FormulaExpr, FormulaOptions, FormulaResult, ParseCache,
};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Anything that names a single cell
pub trait IntoCellReference {
    /// Resolve to a cell reference
    fn into_cell_reference(self) -> FormulaResult<CellReference>;
}

impl IntoCellReference for CellReference {
    fn into_cell_reference(self) -> FormulaResult<CellReference> {
        Ok(self)
    }
}

impl IntoCellReference for &CellReference {
    fn into_cell_reference(self) -> FormulaResult<CellReference> {
        Ok(*self)
    }
}

impl IntoCellReference for &str {
    fn into_cell_reference(self) -> FormulaResult<CellReference> {
        Ok(CellReference::parse(self)?)
    }
}

impl IntoCellReference for &String {
    fn into_cell_reference(self) -> FormulaResult<CellReference> {
        self.as_str().into_cell_reference()
    }
}

impl IntoCellReference for String {
    fn into_cell_reference(self) -> FormulaResult<CellReference> {
        self.as_str().into_cell_reference()
    }
}

/// Result of [`FormulaEngine::validate_formula`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Whether the formula parsed
    pub is_valid: bool,
    /// Human-readable reason when it did not
    pub message: Option<String>,
}

impl Validation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    fn invalid(error: &FormulaError) -> Self {
        Self {
            is_valid: false,
            message: Some(error.to_string()),
        }
    }
}

/// Spreadsheet formula engine
///
/// # Example
///
/// ```rust
/// use fincalc::FormulaEngine;
/// use rust_decimal::Decimal;
/// use std::collections::HashMap;
///
/// let engine = FormulaEngine::new();
/// let values = HashMap::from([("A1".to_string(), Decimal::from(5))]);
/// assert_eq!(engine.evaluate("=A1+1", &values).unwrap(), Decimal::from(6));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormulaEngine {
    options: FormulaOptions,
    cache: Option<Arc<ParseCache>>,
}

impl FormulaEngine {
    /// Create an engine with default options and no parse cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given options
    pub fn with_options(options: FormulaOptions) -> Self {
        Self {
            options,
            cache: None,
        }
    }

    /// Share a parse cache with this engine
    pub fn with_cache(mut self, cache: Arc<ParseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Engine options
    pub fn options(&self) -> &FormulaOptions {
        &self.options
    }

    /// The shared parse cache, if any
    pub fn cache(&self) -> Option<&Arc<ParseCache>> {
        self.cache.as_ref()
    }

    /// Parse a formula, going through the cache when one is attached
    pub fn parse(&self, formula: &str) -> FormulaResult<Arc<FormulaExpr>> {
        let limits = self.options.parse_limits();
        match &self.cache {
            Some(cache) => cache.get_or_parse(formula, limits),
            None => parse_formula(formula, limits).map(Arc::new),
        }
    }

    /// Expand a range such as `A3:A1` into its cells in row-major order
    ///
    /// Inverted corners are normalized and a single cell expands to itself.
    /// No size limit applies here.
    pub fn expand_range(&self, range: &str) -> FormulaResult<Vec<CellReference>> {
        let range = CellRange::parse(range)?;
        Ok(range.cells().collect())
    }

    /// Every cell a parsed formula reads, with ranges expanded
    pub fn extract_dependencies(&self, expr: &FormulaExpr) -> FormulaResult<BTreeSet<CellReference>> {
        extract_dependencies(expr, &self.options)
    }

    /// Parse a formula and list the references it reads
    ///
    /// Ranges are reported as one normalized token (`B1:B5`), in order of
    /// first appearance without repeats.
    pub fn parse_dependencies(&self, formula: &str) -> FormulaResult<Vec<String>> {
        let expr = self.parse(formula)?;
        Ok(reference_tokens(&expr))
    }

    /// Whether putting `formula` in `target` would close a cycle
    ///
    /// The candidate replaces any formula `target` already has in `cells`.
    /// Nothing is mutated.
    pub fn would_create_circular_dependency(
        &self,
        target: impl IntoCellReference,
        formula: &str,
        cells: &[Cell],
    ) -> FormulaResult<bool> {
        let target = target.into_cell_reference()?;
        let expr = self.parse(formula)?;
        let snapshot = Snapshot::build(self, cells, Some((target, expr)))?;
        Ok(snapshot
            .graph
            .has_circular_reference(&target, Direction::Precedents))
    }

    /// Evaluate a formula against string-keyed cell values
    ///
    /// Keys are normalized (`a1` reads as `A1`). Keys that are not cell
    /// references are ignored. If two keys name the same cell, the one that
    /// sorts last wins.
    pub fn evaluate(&self, formula: &str, values: &HashMap<String, Decimal>) -> FormulaResult<Decimal> {
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();

        let mut resolved = HashMap::with_capacity(values.len());
        for key in keys {
            match CellReference::parse(key) {
                Ok(reference) => {
                    resolved.insert(reference, values[key]);
                }
                Err(e) => debug!(key = %key, error = %e, "ignoring value with a non-cell key"),
            }
        }

        self.evaluate_with(formula, &resolved)
    }

    /// Evaluate a formula against any value source
    pub fn evaluate_with(&self, formula: &str, values: &impl CellValues) -> FormulaResult<Decimal> {
        let expr = self.parse(formula)?;
        let ctx = EvaluationContext::new(values, &self.options);
        evaluate(&expr, &ctx)
    }

    /// Formula cells to recompute after `changed` changes, in order
    pub fn cells_to_recalculate<'a>(
        &self,
        changed: impl IntoCellReference,
        cells: &'a [Cell],
    ) -> FormulaResult<Vec<&'a Cell>> {
        let changed = changed.into_cell_reference()?;
        let snapshot = Snapshot::build(self, cells, None)?;
        let order = snapshot.plan(&changed)?;
        Ok(order
            .iter()
            .filter_map(|reference| snapshot.cells.get(reference).copied())
            .collect())
    }

    /// Set `changed` to `new_value` and recompute everything downstream
    ///
    /// Returns the cells whose value changed and the cells that evaluated to
    /// an error. The caller's cells are left untouched.
    pub fn recalculate_dependents(
        &self,
        changed: impl IntoCellReference,
        new_value: Decimal,
        cells: &[Cell],
    ) -> FormulaResult<Recalculation> {
        let changed = changed.into_cell_reference()?;
        let snapshot = Snapshot::build(self, cells, None)?;
        let order = snapshot.plan(&changed)?;
        Ok(snapshot.recalculate(self, changed, new_value, &order))
    }

    /// Check whether a formula parses, without evaluating it
    ///
    /// Blank text is valid: it means the formula is being cleared.
    pub fn validate_formula(&self, formula: &str) -> Validation {
        if formula.trim().is_empty() {
            return Validation::valid();
        }
        match self.parse(formula) {
            Ok(_) => Validation::valid(),
            Err(e) => Validation::invalid(&e),
        }
    }
}
