use std::fmt;
use std::str::FromStr;

use crate::error::TradeError;

/// Direction filter applied when extracting flows from the inter-industry
/// matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    Imports,
    Exports,
    Domestic,
}

impl FlowType {
    /// Minimum flow value kept after filtering. Domestic intra-country flows
    /// are smaller in the aggregated matrix, so a uniform threshold would
    /// drop too much signal.
    pub fn threshold(self) -> f64 {
        match self {
            FlowType::Imports | FlowType::Exports => 0.01,
            FlowType::Domestic => 0.001,
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowType::Imports => write!(f, "imports"),
            FlowType::Exports => write!(f, "exports"),
            FlowType::Domestic => write!(f, "domestic"),
        }
    }
}

impl FromStr for FlowType {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "imports" => Ok(FlowType::Imports),
            "exports" => Ok(FlowType::Exports),
            "domestic" => Ok(FlowType::Domestic),
            other => Err(TradeError::InvalidData(format!(
                "Invalid tradeflow type: {other}"
            ))),
        }
    }
}

/// One resolved pipeline invocation. Threaded through every stage as a value;
/// there is no process-wide settings object.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub year: i32,
    pub country: String,
    pub flow_type: FlowType,
}

impl RunSpec {
    pub fn new(year: i32, country: impl Into<String>, flow_type: FlowType) -> Self {
        Self {
            year,
            country: country.into(),
            flow_type,
        }
    }
}

/// Whether the attributor keeps every coefficient or a bounded, prioritized
/// subset per extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionMode {
    Comprehensive,
    Selective,
}

/// Numeric limits for the factor attribution stage.
#[derive(Debug, Clone)]
pub struct AttributionOptions {
    pub mode: AttributionMode,
    /// Per-extension row quota in selective mode.
    pub factor_quota: usize,
    /// Associations with |impact_value| at or below this are dropped.
    pub impact_epsilon: f64,
    /// Trade rows joined per batch. Memory bound only; any value produces
    /// the same output table.
    pub chunk_size: usize,
}

impl Default for AttributionOptions {
    fn default() -> Self {
        Self {
            mode: AttributionMode::Selective,
            factor_quota: 50,
            impact_epsilon: 0.001,
            chunk_size: 10_000,
        }
    }
}
