//! # fincalc-formula
//!
//! Formula parser and evaluator for fincalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST) with fail-fast function and arity checks
//! - Decimal evaluation against any [`CellValues`] source
//! - The closed set of built-in functions
//! - Dependency extraction and the dependency graph used for recalculation
//! - An injectable, thread-safe parse cache
//!
//! ## Example
//!
//! ```rust
//! use fincalc_formula::{evaluate, parse_formula, EvaluationContext, FormulaOptions};
//! use fincalc_core::CellReference;
//! use rust_decimal::Decimal;
//! use std::collections::HashMap;
//!
//! let options = FormulaOptions::default();
//! let ast = parse_formula("=SUM(A1:A3) * 2", options.parse_limits()).unwrap();
//!
//! let mut values = HashMap::new();
//! values.insert(CellReference::parse("A1").unwrap(), Decimal::new(15, 1));
//! values.insert(CellReference::parse("A3").unwrap(), Decimal::new(25, 1));
//!
//! let ctx = EvaluationContext::new(&values, &options);
//! assert_eq!(evaluate(&ast, &ctx).unwrap(), Decimal::new(8, 0));
//! ```

pub mod ast;
pub mod cache;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod options;
pub mod parser;

pub use ast::{BinaryOperator, FormulaExpr, Reference, UnaryOperator};
pub use cache::ParseCache;
pub use dependency::{extract_dependencies, reference_tokens, DependencyGraph, Direction, NodeId};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, CellValues, EvaluationContext};
pub use functions::Function;
pub use options::{
    FormulaOptions, ParseLimits, DEFAULT_MAX_EXPRESSION_DEPTH, DEFAULT_MAX_FORMULA_LENGTH,
    DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_RANGE_CELLS,
};
pub use parser::parse_formula;
