use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Missing input file: {0}")]
    MissingInput(PathBuf),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TradeError>;
