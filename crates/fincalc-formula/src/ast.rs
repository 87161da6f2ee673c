//! Formula Abstract Syntax Tree types

use crate::functions::Function;
use fincalc_core::{CellRange, CellReference};
use rust_decimal::Decimal;
use std::fmt;

/// Formula expression AST
///
/// Trees are immutable once parsed and are shared between threads through
/// the parse cache.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(Decimal),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference; only valid as an aggregate argument
    RangeRef(CellRange),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function { func: Function, args: Vec<FormulaExpr> },
}

/// A reference appearing in a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    Cell(&'a CellReference),
    Range(&'a CellRange),
}

impl Reference<'_> {
    /// Source-style text of the reference ("B2" or "A1:A3")
    pub fn to_a1_string(&self) -> String {
        match self {
            Reference::Cell(cell) => cell.to_a1_string(),
            Reference::Range(range) => range.to_a1_string(),
        }
    }
}

impl FormulaExpr {
    /// Number of nodes on the longest path from this node to a leaf
    ///
    /// Walks the tree with an explicit stack, so it is safe on any tree.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            match expr {
                FormulaExpr::Number(_) | FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_) => {}
                FormulaExpr::BinaryOp { left, right, .. } => {
                    stack.push((left.as_ref(), depth + 1));
                    stack.push((right.as_ref(), depth + 1));
                }
                FormulaExpr::UnaryOp { operand, .. } => stack.push((operand.as_ref(), depth + 1)),
                FormulaExpr::Function { args, .. } => {
                    stack.extend(args.iter().map(|arg| (arg, depth + 1)));
                }
            }
        }
        deepest
    }

    /// Every cell and range reference, in left-to-right source order
    pub fn references(&self) -> Vec<Reference<'_>> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<Reference<'a>>) {
        match self {
            FormulaExpr::Number(_) => {}
            FormulaExpr::CellRef(cell) => refs.push(Reference::Cell(cell)),
            FormulaExpr::RangeRef(range) => refs.push(Reference::Range(range)),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(refs),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison (1 for true, 0 for false)
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    /// Operator symbol as written in formulas
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    /// Whether this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        !matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Power
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use crate::ParseLimits;

    #[test]
    fn test_references_in_source_order() {
        let expr = parse_formula("=IF(C1>0, SUM(A1:A3), B2) + A1", ParseLimits::default()).unwrap();
        let refs: Vec<String> = expr.references().iter().map(|r| r.to_a1_string()).collect();
        assert_eq!(refs, vec!["C1", "A1:A3", "B2", "A1"]);
    }

    #[test]
    fn test_depth() {
        let depth = |formula: &str| parse_formula(formula, ParseLimits::default()).unwrap().depth();
        assert_eq!(depth("=1"), 1);
        assert_eq!(depth("=1+2*3"), 3);
        assert_eq!(depth("=1+2+3+4"), 4);
        assert_eq!(depth("=SUM(A1:A3, -B1)"), 3);
        assert_eq!(depth("=((5))%"), 2);
    }

    #[test]
    fn test_comparison_operators() {
        assert!(BinaryOperator::LessEqual.is_comparison());
        assert!(!BinaryOperator::Power.is_comparison());
        assert_eq!(BinaryOperator::NotEqual.to_string(), "<>");
    }
}
