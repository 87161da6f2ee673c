//! fincalc CLI - evaluate formulas and plan recalculations over a CSV snapshot

mod snapshot;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use fincalc::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fincalc")]
#[command(author, version, about = "Decimal spreadsheet formula engine")]
struct Cli {
    /// Largest range a formula may read, in cells
    #[arg(long, global = true, default_value_t = fincalc::DEFAULT_MAX_RANGE_CELLS)]
    max_range_cells: u64,

    /// Deepest formula nesting accepted by the parser
    #[arg(long, global = true, default_value_t = fincalc::DEFAULT_MAX_NESTING_DEPTH)]
    max_depth: usize,

    /// Deepest expression tree accepted, counting operator chains
    #[arg(long, global = true, default_value_t = fincalc::DEFAULT_MAX_EXPRESSION_DEPTH)]
    max_expression_depth: usize,

    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula
    Eval {
        /// Formula text, e.g. "=SUM(A1:A3)*2"
        formula: String,

        /// Cell values as CELL=VALUE (repeatable)
        #[arg(short, long = "cell", value_name = "CELL=VALUE")]
        cells: Vec<String>,

        /// Decimal places to display (banker's rounding)
        #[arg(short, long)]
        places: Option<u32>,
    },

    /// Check that a formula parses
    Validate {
        /// Formula text
        formula: String,
    },

    /// List the references a formula reads
    Deps {
        /// Formula text
        formula: String,
    },

    /// Expand a range into its cells
    Expand {
        /// Range such as A1:C3
        range: String,
    },

    /// Report whether putting a formula in a cell would create a cycle
    Check {
        /// Snapshot CSV (cell,value,formula)
        snapshot: PathBuf,
        /// Cell that would receive the formula
        cell: String,
        /// Candidate formula
        formula: String,
    },

    /// Print the order in which dependents of a cell are recomputed
    Plan {
        /// Snapshot CSV (cell,value,formula)
        snapshot: PathBuf,
        /// Changed cell
        cell: String,
    },

    /// Set a cell and print every dependent value that changes
    Recalc {
        /// Snapshot CSV (cell,value,formula)
        snapshot: PathBuf,
        /// Changed cell
        cell: String,
        /// New value
        value: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Decimal places to display (banker's rounding)
        #[arg(short, long)]
        places: Option<u32>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = FormulaEngine::with_options(FormulaOptions {
        max_range_cells: cli.max_range_cells,
        max_nesting_depth: cli.max_depth,
        max_expression_depth: cli.max_expression_depth,
        ..Default::default()
    });

    match cli.command {
        Commands::Eval {
            formula,
            cells,
            places,
        } => eval(&engine, &formula, &cells, places),
        Commands::Validate { formula } => Ok(validate(&engine, &formula)),
        Commands::Deps { formula } => deps(&engine, &formula),
        Commands::Expand { range } => expand(&engine, &range),
        Commands::Check {
            snapshot,
            cell,
            formula,
        } => check(&engine, &snapshot, &cell, &formula),
        Commands::Plan { snapshot, cell } => plan(&engine, &snapshot, &cell),
        Commands::Recalc {
            snapshot,
            cell,
            value,
            json,
            places,
        } => recalc(&engine, &snapshot, &cell, &value, json, places),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Split `A1=5` into a cell and a value
fn parse_assignment(text: &str) -> Result<(String, Decimal)> {
    let (cell, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CELL=VALUE, got '{}'", text))?;
    let reference =
        CellReference::parse(cell).with_context(|| format!("bad cell in '{}'", text))?;
    let value =
        snapshot::parse_decimal(value).with_context(|| format!("bad value in '{}'", text))?;
    Ok((reference.to_a1_string(), value))
}

fn display(engine: &FormulaEngine, value: Decimal, places: Option<u32>) -> String {
    match places {
        Some(places) => engine.options().format_value(value, places),
        None => value.normalize().to_string(),
    }
}

fn eval(
    engine: &FormulaEngine,
    formula: &str,
    cells: &[String],
    places: Option<u32>,
) -> Result<ExitCode> {
    let values = cells
        .iter()
        .map(|text| parse_assignment(text))
        .collect::<Result<HashMap<_, _>>>()?;

    match engine.evaluate(formula, &values) {
        Ok(value) => {
            println!("{}", display(engine, value, places));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}\t{}", e.code(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn validate(engine: &FormulaEngine, formula: &str) -> ExitCode {
    let validation = engine.validate_formula(formula);
    match validation.message {
        None => {
            println!("ok");
            ExitCode::SUCCESS
        }
        Some(message) => {
            println!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn deps(engine: &FormulaEngine, formula: &str) -> Result<ExitCode> {
    for token in engine.parse_dependencies(formula)? {
        println!("{}", token);
    }
    Ok(ExitCode::SUCCESS)
}

fn expand(engine: &FormulaEngine, range: &str) -> Result<ExitCode> {
    for cell in engine.expand_range(range)? {
        println!("{}", cell);
    }
    Ok(ExitCode::SUCCESS)
}

fn check(engine: &FormulaEngine, path: &Path, cell: &str, formula: &str) -> Result<ExitCode> {
    let cells = snapshot::load(path)?;
    if engine.would_create_circular_dependency(cell, formula, &cells)? {
        println!("circular");
        Ok(ExitCode::FAILURE)
    } else {
        println!("ok");
        Ok(ExitCode::SUCCESS)
    }
}

fn plan(engine: &FormulaEngine, path: &Path, cell: &str) -> Result<ExitCode> {
    let cells = snapshot::load(path)?;
    let order = engine
        .cells_to_recalculate(cell, &cells)
        .with_context(|| format!("Failed to plan recalculation of {}", cell))?;

    for cell in order {
        println!("{}\t{}", cell.reference, cell.formula.as_deref().unwrap_or_default());
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Serialize)]
struct RecalcReport {
    updated: BTreeMap<String, String>,
    errors: BTreeMap<String, ErrorReport>,
    evaluated: usize,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    code: String,
    message: String,
}

impl RecalcReport {
    fn new(engine: &FormulaEngine, result: &Recalculation, places: Option<u32>) -> Self {
        Self {
            updated: result
                .updated
                .iter()
                .map(|(cell, value)| (cell.to_a1_string(), display(engine, *value, places)))
                .collect(),
            errors: result
                .errors
                .iter()
                .map(|(cell, error)| {
                    let report = ErrorReport {
                        code: error.code().to_string(),
                        message: error.to_string(),
                    };
                    (cell.to_a1_string(), report)
                })
                .collect(),
            evaluated: result.evaluated,
        }
    }
}

fn recalc(
    engine: &FormulaEngine,
    path: &Path,
    cell: &str,
    value: &str,
    json: bool,
    places: Option<u32>,
) -> Result<ExitCode> {
    let cells = snapshot::load(path)?;
    let value = snapshot::parse_decimal(value)?;
    let result = engine
        .recalculate_dependents(cell, value, &cells)
        .with_context(|| format!("Failed to recalculate dependents of {}", cell))?;

    let report = RecalcReport::new(engine, &result, places);
    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", text);
    } else {
        for (cell, value) in &report.updated {
            println!("{}\t{}", cell, value);
        }
        for (cell, error) in &report.errors {
            println!("{}\t{}\t{}", cell, error.code, error.message);
        }
        eprintln!("Evaluated {} formulas ({} errors)", report.evaluated, report.errors.len());
    }

    Ok(ExitCode::SUCCESS)
}
