//! Math and aggregate functions
//!
//! Aggregates receive their inputs already flattened: range cells that hold
//! no value have been skipped by the evaluator.

use crate::error::{FormulaError, FormulaResult};
use rust_decimal::prelude::*;

/// Largest scale a [`Decimal`] can carry
const MAX_SCALE: i64 = 28;

fn overflow(what: &str) -> FormulaError {
    FormulaError::invalid_operation(format!("{} overflows the decimal range", what))
}

/// SUM function
pub fn fn_sum(values: &[Decimal]) -> FormulaResult<Decimal> {
    values.iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(*v).ok_or_else(|| overflow("SUM"))
    })
}

/// AVERAGE function; no inputs is a division by zero
pub fn fn_average(values: &[Decimal]) -> FormulaResult<Decimal> {
    if values.is_empty() {
        return Err(FormulaError::DivideByZero);
    }
    let sum = fn_sum(values)?;
    sum.checked_div(Decimal::from(values.len()))
        .ok_or_else(|| overflow("AVERAGE"))
}

/// MIN function; no inputs gives 0
pub fn fn_min(values: &[Decimal]) -> Decimal {
    values.iter().copied().min().unwrap_or(Decimal::ZERO)
}

/// MAX function; no inputs gives 0
pub fn fn_max(values: &[Decimal]) -> Decimal {
    values.iter().copied().max().unwrap_or(Decimal::ZERO)
}

/// COUNT function
pub fn fn_count(values: &[Decimal]) -> Decimal {
    Decimal::from(values.len())
}

/// ABS function
pub fn fn_abs(value: Decimal) -> Decimal {
    value.abs()
}

/// ROUND(number, [num_digits])
///
/// `digits` is truncated toward zero. Negative digits round to the left of
/// the decimal point: `ROUND(1250, -2)` is 1300 with half-away-from-zero.
pub fn fn_round(
    value: Decimal,
    digits: Decimal,
    strategy: RoundingStrategy,
) -> FormulaResult<Decimal> {
    // Out-of-i64 digit counts saturate; they are far past any decimal scale.
    let digits = digits.trunc().to_i64().unwrap_or(if digits.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    });

    if digits >= 0 {
        return Ok(value.round_dp_with_strategy(digits.min(MAX_SCALE) as u32, strategy));
    }

    if digits < -MAX_SCALE {
        // Every representable value is below 10^29, so it rounds to zero
        // unless it is at least half of 10^29, which does not fit.
        let half = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
        return if digits == -(MAX_SCALE + 1) && value.abs() >= half {
            Err(overflow("ROUND"))
        } else {
            Ok(Decimal::ZERO)
        };
    }

    let factor = Decimal::from_i128_with_scale(10i128.pow((-digits) as u32), 0);
    let scaled = value.checked_div(factor).ok_or_else(|| overflow("ROUND"))?;
    scaled
        .round_dp_with_strategy(0, strategy)
        .checked_mul(factor)
        .ok_or_else(|| overflow("ROUND"))
}

/// The `^` operator
///
/// Integral exponents are exact; fractional exponents of a positive base go
/// through the decimal `exp(ln(x) * y)` approximation.
pub fn power(base: Decimal, exponent: Decimal) -> FormulaResult<Decimal> {
    if base.is_zero() {
        if exponent.is_zero() {
            return Err(FormulaError::invalid_operation("0^0 is undefined"));
        }
        if exponent.is_sign_negative() {
            return Err(FormulaError::DivideByZero);
        }
        return Ok(Decimal::ZERO);
    }

    let result = if exponent.fract().is_zero() {
        exponent.to_i64().and_then(|exp| base.checked_powi(exp))
    } else if base.is_sign_negative() {
        return Err(FormulaError::invalid_operation(format!(
            "{}^{} has no real result",
            base, exponent
        )));
    } else {
        base.checked_powd(exponent)
    };

    match result {
        Some(value) => Ok(value),
        // |base| > 1 with a negative exponent is below one in magnitude, so
        // failing here means it is smaller than the finest representable step
        None if exponent.is_sign_negative() && base.abs() > Decimal::ONE => Ok(Decimal::ZERO),
        None => Err(overflow(&format!("{}^{}", base, exponent))),
    }
}
