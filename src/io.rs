use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{Result, TradeError};

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names; callers cast what they need.
pub fn read_csv_strings(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(TradeError::MissingInput(path.to_path_buf()));
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &name in required {
        if df.column(name).is_err() {
            return Err(TradeError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Cast string columns to Float64.
pub fn cast_f64(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| col(*c).cast(DataType::Float64))
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Cast string columns to Int64.
pub fn cast_i64(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| col(*c).cast(DataType::Int64))
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Write a table as headed CSV. `float_precision` gives fixed-point
/// formatting for all float columns; None keeps the default rendering.
pub fn write_csv(path: &Path, df: &DataFrame, float_precision: Option<usize>) -> Result<()> {
    let mut file = File::create(path)?;
    let mut out = df.clone();
    let mut writer = CsvWriter::new(&mut file).include_header(true);
    if let Some(precision) = float_precision {
        writer = writer.with_float_precision(Some(precision));
    }
    writer.finish(&mut out)?;
    Ok(())
}

/// Round a Float64 column in place to the given number of decimal places.
/// Used only when persisting; intermediate results stay full precision.
pub fn round_column(df: &mut DataFrame, column: &str, decimals: u32) -> Result<()> {
    let scale = 10f64.powi(decimals as i32);
    let values = df.column(column)?.f64()?;
    let rounded: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.map(|x| (x * scale).round() / scale))
        .collect();
    df.with_column(Series::new(column.into(), rounded))?;
    Ok(())
}
