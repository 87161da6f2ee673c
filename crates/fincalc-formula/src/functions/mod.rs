//! Built-in functions
//!
//! The function table is closed: a name outside it is rejected when the
//! formula is parsed, never at evaluation time.

pub mod logical;
pub mod math;

use crate::error::{FormulaError, FormulaResult};
use std::fmt;

/// A built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sum,
    Average,
    Min,
    Max,
    Count,
    If,
    Round,
    Abs,
}

impl Function {
    /// Every built-in function
    pub const ALL: [Function; 8] = [
        Function::Sum,
        Function::Average,
        Function::Min,
        Function::Max,
        Function::Count,
        Function::If,
        Function::Round,
        Function::Abs,
    ];

    /// Look up a function by name (case-insensitive); `AVG` is an alias for `AVERAGE`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(Function::Sum),
            "AVERAGE" | "AVG" => Some(Function::Average),
            "MIN" => Some(Function::Min),
            "MAX" => Some(Function::Max),
            "COUNT" => Some(Function::Count),
            "IF" => Some(Function::If),
            "ROUND" => Some(Function::Round),
            "ABS" => Some(Function::Abs),
            _ => None,
        }
    }

    /// Canonical (uppercase) name
    pub fn name(&self) -> &'static str {
        match self {
            Function::Sum => "SUM",
            Function::Average => "AVERAGE",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Count => "COUNT",
            Function::If => "IF",
            Function::Round => "ROUND",
            Function::Abs => "ABS",
        }
    }

    /// Minimum arguments
    pub fn min_args(&self) -> usize {
        match self {
            Function::If => 2,
            _ => 1,
        }
    }

    /// Maximum arguments (None = unlimited)
    pub fn max_args(&self) -> Option<usize> {
        match self {
            Function::If => Some(3),
            Function::Round => Some(2),
            Function::Abs => Some(1),
            _ => None,
        }
    }

    /// Whether a call with `count` arguments is well-formed
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args() && self.max_args().map_or(true, |max| count <= max)
    }

    /// Check an argument count against this function's arity
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(self.arity_error(count))
        }
    }

    /// The error reported for a call with the wrong number of arguments
    pub fn arity_error(&self, count: usize) -> FormulaError {
        let min = self.min_args();
        let expected = match self.max_args() {
            Some(max) if max == min => format!("exactly {}", arguments(min)),
            Some(max) => format!("{} to {} arguments", min, max),
            None => format!("at least {}", arguments(min)),
        };
        FormulaError::argument(self.name(), format!("expected {}, got {}", expected, count))
    }
}

fn arguments(n: usize) -> String {
    if n == 1 {
        "1 argument".to_string()
    } else {
        format!("{} arguments", n)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
