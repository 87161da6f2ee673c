//! Cell snapshots stored as CSV
//!
//! A snapshot has a header row and the columns `cell,value,formula`. The
//! value may be blank (zero) and the formula column may be blank or absent.
//!
//! ```text
//! cell,value,formula
//! A1,1,
//! B1,2,=A1*2
//! ```

use anyhow::{Context, Result};
use fincalc::{Cell, CellReference};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    cell: CellReference,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    formula: Option<String>,
}

/// Parse a decimal as written in a snapshot or on the command line
///
/// Accepts plain (`12.50`) and scientific (`1.5e3`) notation.
pub fn parse_decimal(text: &str) -> Result<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .with_context(|| format!("'{}' is not a number", text))
}

/// Load every row of a snapshot file
pub fn load(path: &Path) -> Result<Vec<Cell>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;

    let mut cells = Vec::new();
    for (index, row) in reader.deserialize::<SnapshotRow>().enumerate() {
        // Line 1 is the header
        let line = index + 2;
        let row = row.with_context(|| format!("{}: bad row on line {}", path.display(), line))?;

        let value = match row.value.as_deref() {
            Some(text) if !text.is_empty() => parse_decimal(text)
                .with_context(|| format!("{}: bad value on line {}", path.display(), line))?,
            _ => Decimal::ZERO,
        };

        cells.push(Cell {
            reference: row.cell,
            value,
            formula: row.formula,
        });
    }

    Ok(cells)
}
