//! Logical functions

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{scalar_argument, EvaluationContext};
use crate::functions::Function;
use rust_decimal::Decimal;

/// Any non-zero value is true
pub fn is_truthy(value: Decimal) -> bool {
    !value.is_zero()
}

/// IF(condition, then, [else])
///
/// Only the selected branch is evaluated, so an error in the other branch
/// never surfaces. A missing else branch yields 0.
pub fn fn_if(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<Decimal> {
    let (condition, then_branch, else_branch) = match args {
        [condition, then_branch] => (condition, then_branch, None),
        [condition, then_branch, else_branch] => (condition, then_branch, Some(else_branch)),
        _ => return Err(Function::If.arity_error(args.len())),
    };

    if is_truthy(scalar_argument(Function::If, condition, ctx)?) {
        scalar_argument(Function::If, then_branch, ctx)
    } else {
        match else_branch {
            Some(expr) => scalar_argument(Function::If, expr, ctx),
            None => Ok(Decimal::ZERO),
        }
    }
}
