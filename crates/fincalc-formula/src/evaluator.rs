//! Formula evaluator
//!
//! Evaluates formula ASTs to decimal values against a [`CellValues`] source.
//! Every arithmetic step is checked; overflow surfaces as
//! [`FormulaError::InvalidOperation`] instead of wrapping or panicking.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{logical, math, Function};
use crate::options::FormulaOptions;
use fincalc_core::{CellRange, CellReference};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Source of cell values during evaluation
///
/// `None` means the cell holds no value. A referenced blank cell reads as
/// zero; aggregates skip blank cells inside ranges. `Some(Err(..))` is a cell
/// whose own formula failed, and the error propagates to every reader.
pub trait CellValues {
    fn value(&self, cell: &CellReference) -> Option<FormulaResult<Decimal>>;
}

impl<S: BuildHasher> CellValues for HashMap<CellReference, Decimal, S> {
    fn value(&self, cell: &CellReference) -> Option<FormulaResult<Decimal>> {
        self.get(cell).map(|v| Ok(*v))
    }
}

impl<S: BuildHasher> CellValues for HashMap<CellReference, FormulaResult<Decimal>, S> {
    fn value(&self, cell: &CellReference) -> Option<FormulaResult<Decimal>> {
        self.get(cell).cloned()
    }
}

impl CellValues for BTreeMap<CellReference, Decimal> {
    fn value(&self, cell: &CellReference) -> Option<FormulaResult<Decimal>> {
        self.get(cell).map(|v| Ok(*v))
    }
}

impl<T: CellValues + ?Sized> CellValues for &T {
    fn value(&self, cell: &CellReference) -> Option<FormulaResult<Decimal>> {
        (**self).value(cell)
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    values: &'a dyn CellValues,
    options: &'a FormulaOptions,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context over a value source
    pub fn new(values: &'a dyn CellValues, options: &'a FormulaOptions) -> Self {
        Self { values, options }
    }

    /// Options in effect
    pub fn options(&self) -> &FormulaOptions {
        self.options
    }

    /// Value of a cell, `None` if blank
    pub fn lookup(&self, cell: &CellReference) -> FormulaResult<Option<Decimal>> {
        self.values.value(cell).transpose()
    }

    /// Value of a referenced cell; blank reads as zero
    pub fn cell_value(&self, cell: &CellReference) -> FormulaResult<Decimal> {
        Ok(self.lookup(cell)?.unwrap_or(Decimal::ZERO))
    }

    /// Append the values of every non-blank cell in a range, row-major
    pub fn range_values(&self, range: &CellRange, out: &mut Vec<Decimal>) -> FormulaResult<()> {
        self.options.check_range(range)?;
        for cell in range.cells() {
            if let Some(value) = self.lookup(&cell)? {
                out.push(value);
            }
        }
        Ok(())
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<Decimal> {
    match expr {
        FormulaExpr::Number(n) => Ok(*n),

        // === References ===
        FormulaExpr::CellRef(cell) => ctx.cell_value(cell),
        FormulaExpr::RangeRef(range) => Err(FormulaError::InvalidRangeUsage(range.to_a1_string())),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => {
            // Left before right, so the leftmost error wins
            let left_val = evaluate(left, ctx)?;
            let right_val = evaluate(right, ctx)?;
            evaluate_binary_op(*op, left_val, right_val)
        }
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, evaluate(operand, ctx)?),

        // === Functions ===
        FormulaExpr::Function { func, args } => evaluate_function(*func, args, ctx),
    }
}

/// Evaluate a binary operation on two values
pub fn evaluate_binary_op(op: BinaryOperator, l: Decimal, r: Decimal) -> FormulaResult<Decimal> {
    let overflow = || FormulaError::invalid_operation(format!("{} {} {} overflows", l, op, r));
    let truth = |b: bool| Ok(if b { Decimal::ONE } else { Decimal::ZERO });

    match op {
        BinaryOperator::Add => l.checked_add(r).ok_or_else(overflow),
        BinaryOperator::Subtract => l.checked_sub(r).ok_or_else(overflow),
        BinaryOperator::Multiply => l.checked_mul(r).ok_or_else(overflow),
        BinaryOperator::Divide => {
            if r.is_zero() {
                return Err(FormulaError::DivideByZero);
            }
            l.checked_div(r).ok_or_else(overflow)
        }
        BinaryOperator::Power => math::power(l, r),

        BinaryOperator::Equal => truth(l == r),
        BinaryOperator::NotEqual => truth(l != r),
        BinaryOperator::LessThan => truth(l < r),
        BinaryOperator::LessEqual => truth(l <= r),
        BinaryOperator::GreaterThan => truth(l > r),
        BinaryOperator::GreaterEqual => truth(l >= r),
    }
}

fn evaluate_unary_op(op: UnaryOperator, value: Decimal) -> FormulaResult<Decimal> {
    match op {
        UnaryOperator::Negate => Ok(-value),
        UnaryOperator::Percent => value
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or_else(|| FormulaError::invalid_operation(format!("{}% overflows", value))),
    }
}

fn evaluate_function(
    func: Function,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<Decimal> {
    func.check_arity(args.len())?;

    match func {
        Function::Sum => math::fn_sum(&aggregate_inputs(args, ctx)?),
        Function::Average => math::fn_average(&aggregate_inputs(args, ctx)?),
        Function::Min => Ok(math::fn_min(&aggregate_inputs(args, ctx)?)),
        Function::Max => Ok(math::fn_max(&aggregate_inputs(args, ctx)?)),
        Function::Count => Ok(math::fn_count(&aggregate_inputs(args, ctx)?)),
        Function::If => logical::fn_if(args, ctx),
        Function::Round => {
            let (value, digits) = match args {
                [value] => (value, None),
                [value, digits] => (value, Some(digits)),
                _ => return Err(func.arity_error(args.len())),
            };
            let value = scalar_argument(func, value, ctx)?;
            let digits = match digits {
                Some(expr) => scalar_argument(func, expr, ctx)?,
                None => Decimal::ZERO,
            };
            math::fn_round(value, digits, ctx.options().round_strategy)
        }
        Function::Abs => match args {
            [value] => Ok(math::fn_abs(scalar_argument(func, value, ctx)?)),
            _ => Err(func.arity_error(args.len())),
        },
    }
}

/// Evaluate an argument of a function that takes single values
pub(crate) fn scalar_argument(
    func: Function,
    arg: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<Decimal> {
    if let FormulaExpr::RangeRef(range) = arg {
        return Err(FormulaError::argument(
            func.name(),
            format!("expects a single value, got range {}", range),
        ));
    }
    evaluate(arg, ctx)
}

/// Flatten aggregate arguments into their numeric inputs
///
/// Ranges expand row-major and a directly referenced cell counts only if it
/// holds a value. Any other argument is evaluated as an expression.
fn aggregate_inputs(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<Vec<Decimal>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FormulaExpr::RangeRef(range) => ctx.range_values(range, &mut values)?,
            FormulaExpr::CellRef(cell) => {
                if let Some(value) = ctx.lookup(cell)? {
                    values.push(value);
                }
            }
            other => values.push(evaluate(other, ctx)?),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use crate::ParseLimits;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cell(a1: &str) -> CellReference {
        CellReference::parse(a1).unwrap()
    }

    fn eval_with(formula: &str, cells: &[(&str, &str)]) -> FormulaResult<Decimal> {
        let values: HashMap<CellReference, Decimal> =
            cells.iter().map(|(c, v)| (cell(c), d(v))).collect();
        let options = FormulaOptions::default();
        let ast = parse_formula(formula, options.parse_limits())?;
        let ctx = EvaluationContext::new(&values, &options);
        evaluate(&ast, &ctx)
    }

    fn eval(formula: &str) -> FormulaResult<Decimal> {
        eval_with(formula, &[])
    }

    #[test]
    fn test_evaluate_number() {
        assert_eq!(eval("=42").unwrap(), d("42"));
        assert_eq!(eval("=3.14").unwrap(), d("3.14"));
        assert_eq!(eval("=1.5e3").unwrap(), d("1500"));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("=1+2").unwrap(), d("3"));
        assert_eq!(eval("=10-3").unwrap(), d("7"));
        assert_eq!(eval("=4*5").unwrap(), d("20"));
        assert_eq!(eval("=20/4").unwrap(), d("5"));
        assert_eq!(eval("=2^10").unwrap(), d("1024"));
    }

    #[test]
    fn test_decimal_exactness() {
        assert_eq!(eval("=0.1+0.2").unwrap(), d("0.3"));
        assert_eq!(eval("=0.1+0.2=0.3").unwrap(), Decimal::ONE);
        assert_eq!(eval("=1.10*3").unwrap(), d("3.30"));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(eval("=1+2*3").unwrap(), d("7"));
        assert_eq!(eval("=(1+2)*3").unwrap(), d("9"));
        assert_eq!(eval("=2+3*4-5").unwrap(), d("9"));
        assert_eq!(eval("=10-4-3").unwrap(), d("3"));
        assert_eq!(eval("=2^3^2").unwrap(), d("512"));
        assert_eq!(eval("=-2^2").unwrap(), d("4"));
        assert_eq!(eval("=2*3^2").unwrap(), d("18"));
    }

    #[test]
    fn test_evaluate_unary() {
        assert_eq!(eval("=-5").unwrap(), d("-5"));
        assert_eq!(eval("=+5").unwrap(), d("5"));
        assert_eq!(eval("=--5").unwrap(), d("5"));
        assert_eq!(eval("=50%").unwrap(), d("0.5"));
        assert_eq!(eval("=200*5%").unwrap(), d("10"));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("=1<2").unwrap(), d("1"));
        assert_eq!(eval("=1>2").unwrap(), d("0"));
        assert_eq!(eval("=5=5").unwrap(), d("1"));
        assert_eq!(eval("=5<>5").unwrap(), d("0"));
        assert_eq!(eval("=5!=4").unwrap(), d("1"));
        assert_eq!(eval("=3>=3").unwrap(), d("1"));
        assert_eq!(eval("=3<=2").unwrap(), d("0"));
        assert_eq!(eval("=1+1=2").unwrap(), d("1"));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(eval("=1/0"), Err(FormulaError::DivideByZero));
        assert_eq!(eval_with("=10/A1", &[]), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_evaluate_overflow() {
        let result = eval("=79228162514264337593543950335*2");
        assert!(matches!(result, Err(FormulaError::InvalidOperation(_))));
    }

    #[test]
    fn test_cell_references() {
        let cells = [("A1", "10"), ("B2", "2.5")];
        assert_eq!(eval_with("=A1*B2", &cells).unwrap(), d("25"));
        assert_eq!(eval_with("=a1+b2", &cells).unwrap(), d("12.5"));
        // Blank cells read as zero
        assert_eq!(eval_with("=A1+C3", &cells).unwrap(), d("10"));
    }

    #[test]
    fn test_range_outside_aggregate() {
        assert_eq!(
            eval("=A1:A3+1"),
            Err(FormulaError::InvalidRangeUsage("A1:A3".into()))
        );
        assert!(matches!(
            eval("=ABS(A1:A3)"),
            Err(FormulaError::Argument { .. })
        ));
        assert!(matches!(
            eval("=IF(1, A1:A3, 0)"),
            Err(FormulaError::Argument { .. })
        ));
    }

    #[test]
    fn test_evaluate_sum() {
        let cells = [("A1", "1"), ("A2", "2"), ("A3", "3")];
        assert_eq!(eval_with("=SUM(A1:A3)", &cells).unwrap(), d("6"));
        assert_eq!(eval_with("=SUM(A1:A3, 10, A1*2)", &cells).unwrap(), d("18"));
        assert_eq!(eval_with("=SUM(A3:A1)", &cells).unwrap(), d("6"));
        assert_eq!(eval_with("=SUM(A1:A10)", &cells).unwrap(), d("6"));
    }

    #[test]
    fn test_evaluate_average() {
        let cells = [("A1", "10"), ("A3", "20")];
        // Blank A2 is skipped, not counted as zero
        assert_eq!(eval_with("=AVERAGE(A1:A3)", &cells).unwrap(), d("15"));
        assert_eq!(eval_with("=AVG(A1:A3)", &cells).unwrap(), d("15"));
        assert_eq!(eval("=AVERAGE(B1:B5)"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_evaluate_min_max() {
        let cells = [("A1", "4"), ("A2", "-7"), ("A3", "9")];
        assert_eq!(eval_with("=MIN(A1:A3)", &cells).unwrap(), d("-7"));
        assert_eq!(eval_with("=MAX(A1:A3)", &cells).unwrap(), d("9"));
        assert_eq!(eval_with("=MIN(A1:A3, -10)", &cells).unwrap(), d("-10"));
        assert_eq!(eval("=MAX(B1:B3)").unwrap(), d("0"));
    }

    #[test]
    fn test_evaluate_count() {
        let cells = [("A1", "4"), ("A3", "0")];
        assert_eq!(eval_with("=COUNT(A1:A5)", &cells).unwrap(), d("2"));
        assert_eq!(eval_with("=COUNT(A1, A2)", &cells).unwrap(), d("1"));
        assert_eq!(eval_with("=COUNT(A1:A5, 7)", &cells).unwrap(), d("3"));
    }

    #[test]
    fn test_evaluate_if() {
        assert_eq!(eval("=IF(1>0, 10, 20)").unwrap(), d("10"));
        assert_eq!(eval("=IF(1<0, 10, 20)").unwrap(), d("20"));
        assert_eq!(eval("=IF(0, 10)").unwrap(), d("0"));
        assert_eq!(eval("=IF(-3, 10)").unwrap(), d("10"));
    }

    #[test]
    fn test_if_evaluates_only_selected_branch() {
        assert_eq!(eval("=IF(1, 5, 1/0)").unwrap(), d("5"));
        assert_eq!(eval("=IF(0, 1/0, 6)").unwrap(), d("6"));
        assert_eq!(eval("=IF(1, 1/0, 6)"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_evaluate_round_and_abs() {
        assert_eq!(eval("=ROUND(2.345, 2)").unwrap(), d("2.35"));
        assert_eq!(eval("=ROUND(2.5)").unwrap(), d("3"));
        assert_eq!(eval("=ROUND(1250, -2)").unwrap(), d("1300"));
        assert_eq!(eval("=ABS(-3.5)").unwrap(), d("3.5"));
    }

    #[test]
    fn test_evaluate_nested_functions() {
        let cells = [("A1", "1"), ("A2", "2"), ("A3", "3"), ("B1", "-4")];
        assert_eq!(
            eval_with("=ROUND(AVERAGE(A1:A3) * ABS(B1) / 3, 2)", &cells).unwrap(),
            d("2.67")
        );
        assert_eq!(
            eval_with("=IF(SUM(A1:A3) > 5, MAX(A1:A3), MIN(A1:A3))", &cells).unwrap(),
            d("3")
        );
    }

    #[test]
    fn test_errors_are_sticky() {
        let mut values: HashMap<CellReference, FormulaResult<Decimal>> = HashMap::new();
        values.insert(cell("A1"), Ok(d("1")));
        values.insert(cell("A2"), Err(FormulaError::DivideByZero));
        let options = FormulaOptions::default();
        let ctx = EvaluationContext::new(&values, &options);

        let run = |formula: &str| {
            let ast = parse_formula(formula, ParseLimits::default()).unwrap();
            evaluate(&ast, &ctx)
        };
        assert_eq!(run("=A2+1"), Err(FormulaError::DivideByZero));
        assert_eq!(run("=SUM(A1:A3)"), Err(FormulaError::DivideByZero));
        assert_eq!(run("=COUNT(A1:A3)"), Err(FormulaError::DivideByZero));
        assert_eq!(run("=IF(A1, 2, A2)").unwrap(), d("2"));
    }

    #[test]
    fn test_range_size_limit() {
        let values: HashMap<CellReference, Decimal> = HashMap::new();
        let options = FormulaOptions {
            max_range_cells: 100,
            ..Default::default()
        };
        let ctx = EvaluationContext::new(&values, &options);
        let ast = parse_formula("=SUM(A1:A101)", options.parse_limits()).unwrap();
        assert!(matches!(
            evaluate(&ast, &ctx),
            Err(FormulaError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_arity_checked_for_built_trees() {
        let values: HashMap<CellReference, Decimal> = HashMap::new();
        let options = FormulaOptions::default();
        let ctx = EvaluationContext::new(&values, &options);
        let expr = FormulaExpr::Function {
            func: Function::Sum,
            args: vec![],
        };
        assert!(matches!(
            evaluate(&expr, &ctx),
            Err(FormulaError::Argument { .. })
        ));
    }

    #[test]
    fn test_leftmost_error_wins() {
        assert_eq!(eval("=1/0 + ABS(A1:A2)"), Err(FormulaError::DivideByZero));
    }
}
