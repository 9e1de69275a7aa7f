//! Ordered stage runner: reference catalogs, flow extraction, factor
//! attribution, impact aggregation, resource split, CSV persistence.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::attribution::attribute_factors;
use crate::catalog::FactorCatalog;
use crate::config::{AttributionOptions, RunSpec};
use crate::error::Result;
use crate::flows::{extract_final_demand, extract_trade_flows};
use crate::impacts::{split_resources, summarize_impacts};
use crate::io;
use crate::mrio::MrioModel;
use crate::schema::association;
use crate::sector::SectorCatalog;

pub const INDUSTRY_FILE: &str = "industry.csv";
pub const FACTOR_FILE: &str = "factor.csv";
pub const TRADE_FILE: &str = "trade.csv";
pub const FINAL_DEMAND_FILE: &str = "final_demand.csv";
pub const TRADE_FACTOR_FILE: &str = "trade_factor.csv";
pub const TRADE_IMPACT_FILE: &str = "trade_impact.csv";
pub const TRADE_EMPLOYMENT_FILE: &str = "trade_employment.csv";
pub const TRADE_RESOURCE_FILE: &str = "trade_resource.csv";
pub const TRADE_MATERIAL_FILE: &str = "trade_material.csv";

/// Row counts of one completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub sectors: usize,
    pub factors: usize,
    pub trade_rows: usize,
    pub final_demand_rows: usize,
    pub association_rows: usize,
}

/// Load the industry catalog from the reference directory, or build it from
/// the model's sector labels and persist it. The persisted file is the
/// source of truth once written.
pub fn ensure_sector_catalog(model: &MrioModel, ref_dir: &Path) -> Result<SectorCatalog> {
    let path = ref_dir.join(INDUSTRY_FILE);
    if path.exists() {
        let catalog = SectorCatalog::read_csv(&path)?;
        info!(sectors = catalog.len(), path = %path.display(), "industry catalog loaded");
        return Ok(catalog);
    }
    let catalog = SectorCatalog::build(&model.flows.sectors())?;
    catalog.write_csv(&path)?;
    info!(sectors = catalog.len(), path = %path.display(), "industry catalog built");
    Ok(catalog)
}

/// Load the factor catalog from the reference directory, or build it from
/// the model's extensions and persist it.
pub fn ensure_factor_catalog(model: &MrioModel, ref_dir: &Path) -> Result<FactorCatalog> {
    let path = ref_dir.join(FACTOR_FILE);
    if path.exists() {
        let catalog = FactorCatalog::read_csv(&path)?;
        info!(factors = catalog.len(), path = %path.display(), "factor catalog loaded");
        return Ok(catalog);
    }
    let catalog = FactorCatalog::build(model);
    catalog.write_csv(&path)?;
    info!(factors = catalog.len(), path = %path.display(), "factor catalog built");
    Ok(catalog)
}

/// Run every stage for one (year, country, flow type) invocation and write
/// the output tables. Each file is written only after its full in-memory
/// table exists.
pub fn run(
    spec: &RunSpec,
    opts: &AttributionOptions,
    model: &MrioModel,
    ref_dir: &Path,
    out_dir: &Path,
) -> Result<RunSummary> {
    fs::create_dir_all(ref_dir)?;
    fs::create_dir_all(out_dir)?;

    info!(
        year = spec.year,
        country = %spec.country,
        flow_type = %spec.flow_type,
        "pipeline run started"
    );

    let sectors = ensure_sector_catalog(model, ref_dir)?;
    let catalog = ensure_factor_catalog(model, ref_dir)?;

    let trade = extract_trade_flows(&model.flows, &sectors, spec)?;
    io::write_csv(&out_dir.join(TRADE_FILE), &trade, Some(2))?;

    let mut final_demand_rows = 0;
    match &model.final_demand {
        Some(demand) => {
            let table = extract_final_demand(demand, &sectors, spec)?;
            io::write_csv(&out_dir.join(FINAL_DEMAND_FILE), &table, Some(2))?;
            final_demand_rows = table.height();
        }
        None => debug!("model carries no final-demand matrix"),
    }

    let associations = attribute_factors(&trade, model, &sectors, &catalog, opts)?;
    let mut persisted = associations.clone();
    io::round_column(&mut persisted, association::COEFFICIENT, 8)?;
    io::round_column(&mut persisted, association::IMPACT_VALUE, 6)?;
    io::write_csv(&out_dir.join(TRADE_FACTOR_FILE), &persisted, None)?;

    let impact = summarize_impacts(&trade, &associations, &catalog)?;
    io::write_csv(&out_dir.join(TRADE_IMPACT_FILE), &impact, Some(6))?;

    let tables = split_resources(&trade, &associations, &catalog)?;
    io::write_csv(&out_dir.join(TRADE_EMPLOYMENT_FILE), &tables.employment, Some(6))?;
    io::write_csv(&out_dir.join(TRADE_RESOURCE_FILE), &tables.resources, Some(6))?;
    io::write_csv(&out_dir.join(TRADE_MATERIAL_FILE), &tables.materials, Some(6))?;

    let summary = RunSummary {
        sectors: sectors.len(),
        factors: catalog.len(),
        trade_rows: trade.height(),
        final_demand_rows,
        association_rows: associations.height(),
    };
    info!(
        trade_rows = summary.trade_rows,
        association_rows = summary.association_rows,
        "pipeline run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::mrio::FlowMatrix;

    fn tiny_model() -> MrioModel {
        let labels = vec![
            ("DE".to_string(), "Wheat".to_string()),
            ("US".to_string(), "Wheat".to_string()),
        ];
        let flows = FlowMatrix::new(labels, vec![vec![0.0, 3.0], vec![1.0, 0.0]]).unwrap();
        MrioModel {
            flows,
            extensions: Vec::new(),
            final_demand: None,
        }
    }

    #[test]
    fn sector_catalog_roundtrips_through_the_reference_file() {
        let dir = tempdir().unwrap();
        let model = tiny_model();

        let built = ensure_sector_catalog(&model, dir.path()).unwrap();
        let loaded = ensure_sector_catalog(&model, dir.path()).unwrap();

        assert_eq!(built.len(), loaded.len());
        assert_eq!(built.industry_id("Wheat"), loaded.industry_id("Wheat"));
        assert!(dir.path().join(INDUSTRY_FILE).exists());
    }

    #[test]
    fn factor_catalog_is_empty_without_extensions() {
        let dir = tempdir().unwrap();
        let catalog = ensure_factor_catalog(&tiny_model(), dir.path()).unwrap();
        assert!(catalog.is_empty());
    }
}
