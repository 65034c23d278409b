//! CSV reading for flamelet tables.
//!
//! Supported format:
//! - UTF-8, comma-separated, mandatory header row naming each column
//! - Double-quoted fields with embedded commas are handled correctly
//! - Blank lines are skipped
//!
//! Columns are selected by name, so a table may carry more variables than a
//! given network uses.

use std::path::Path;

use crate::{
    error::{Error, Result},
    math::matrix::Matrix,
};

/// Reads `path` and returns the `(inputs, targets)` matrices built from the
/// named columns, in the order the names are given.
pub fn read_columns(path: &Path, input_names: &[String], target_names: &[String]) -> Result<(Matrix, Matrix)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Dataset(format!("cannot read {}: {e}", path.display())))?;
    parse_columns(&text, input_names, target_names)
        .map_err(|e| match e {
            Error::Dataset(msg) => Error::Dataset(format!("{}: {msg}", path.display())),
            other => other,
        })
}

/// Parses CSV text with a header row; see `read_columns`.
pub fn parse_columns(text: &str, input_names: &[String], target_names: &[String]) -> Result<(Matrix, Matrix)> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let header = match lines.next() {
        Some((_, line)) => parse_csv_row(line),
        None => return Err(Error::Dataset("CSV file is empty".into())),
    };
    let input_cols = locate(&header, input_names)?;
    let target_cols = locate(&header, target_names)?;

    let mut inputs: Vec<Vec<f64>> = Vec::new();
    let mut targets: Vec<Vec<f64>> = Vec::new();

    for (line_idx, line) in lines {
        let cells = parse_csv_row(line.trim());
        if cells.len() != header.len() {
            return Err(Error::Dataset(format!(
                "Row {}: expected {} columns, got {}",
                line_idx + 1,
                header.len(),
                cells.len()
            )));
        }
        inputs.push(pick(&cells, &input_cols, line_idx + 1)?);
        targets.push(pick(&cells, &target_cols, line_idx + 1)?);
    }

    if inputs.is_empty() {
        return Err(Error::Dataset("CSV contains no data rows after parsing".into()));
    }

    let mut x = Matrix::from_data(inputs);
    let mut y = Matrix::from_data(targets);
    // from_data infers zero columns for an empty selection; keep the width explicit.
    x.cols = input_cols.len();
    y.cols = target_cols.len();
    Ok((x, y))
}

/// Column index of every requested name.
fn locate(header: &[String], names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::Dataset(format!("column '{name}' not found in header")))
        })
        .collect()
}

fn pick(cells: &[String], columns: &[usize], row_num: usize) -> Result<Vec<f64>> {
    columns
        .iter()
        .map(|&c| {
            let cell = cells[c].trim();
            cell.parse::<f64>().map_err(|_| {
                Error::Dataset(format!("Row {}: '{}' is not a valid number", row_num, cell))
            })
        })
        .collect()
}

/// Parses a single CSV row, handling double-quoted fields.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote inside quoted field.
                    current.push('"');
                    chars.next();
                    continue;
                }
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
