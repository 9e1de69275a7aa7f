//! exio-tradekit: MRIO trade-flow extraction and environmental factor
//! attribution.
//!
//! The crate turns an in-memory multi-region input-output model into a set
//! of relational CSV tables for one `(year, country, flow type)` run: trade
//! flows, factor-trade associations, per-trade impact summaries, and the
//! employment / resources / materials split.

pub mod attribution;
pub mod catalog;
pub mod config;
pub mod error;
pub mod flows;
pub mod impacts;
pub mod io;
pub mod mrio;
pub mod pipeline;
pub mod schema;
pub mod sector;

pub use catalog::FactorCatalog;
pub use config::{AttributionMode, AttributionOptions, FlowType, RunSpec};
pub use error::{Result, TradeError};
pub use mrio::{DemandMatrix, ExtensionMatrix, FlowMatrix, MrioModel};
pub use pipeline::{run, RunSummary};
pub use sector::SectorCatalog;
