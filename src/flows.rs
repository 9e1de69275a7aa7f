//! Trade-flow extraction: filter the inter-industry matrix by direction and
//! magnitude, recode sectors to industry ids, and aggregate to the trade
//! table.

use polars::prelude::*;
use tracing::{info, warn};

use crate::config::{FlowType, RunSpec};
use crate::error::Result;
use crate::mrio::{DemandMatrix, FlowMatrix};
use crate::schema::{demand, industry, matrix, trade};
use crate::sector::SectorCatalog;

/// `flow_type` marker on every final-demand row.
const FINAL_DEMAND_FLOW_TYPE: &str = "final_demand";

fn direction_filter(flow_type: FlowType, country: &str) -> Expr {
    match flow_type {
        FlowType::Imports => col(matrix::TO_REGION)
            .eq(lit(country))
            .and(col(matrix::FROM_REGION).neq(lit(country))),
        FlowType::Exports => col(matrix::FROM_REGION)
            .eq(lit(country))
            .and(col(matrix::TO_REGION).neq(lit(country))),
        FlowType::Domestic => col(matrix::FROM_REGION)
            .eq(lit(country))
            .and(col(matrix::TO_REGION).eq(lit(country))),
    }
}

/// Extract the trade-flow table for one (year, country, flow type) run.
///
/// Flows are filtered by direction relative to the focal country, then by the
/// flow type's magnitude threshold, recoded from sector names to industry
/// ids, and summed per (region1, region2, industry1, industry2). Row ids are
/// assigned only after aggregation, on the amount-sorted table, so they are
/// stable across runs.
pub fn extract_trade_flows(
    flows: &FlowMatrix,
    sectors: &SectorCatalog,
    spec: &RunSpec,
) -> Result<DataFrame> {
    let stacked = flows.stack()?;
    let country = spec.country.as_str();

    let filtered = stacked
        .lazy()
        .filter(direction_filter(spec.flow_type, country))
        .filter(col(matrix::FLOW).gt(lit(spec.flow_type.threshold())))
        .collect()?;

    if filtered.height() == 0 {
        info!(
            country,
            flow_type = %spec.flow_type,
            "no flows above threshold"
        );
        return empty_trade_table();
    }

    let lookup = sectors.lookup_frame()?;
    let recoded = filtered
        .clone()
        .lazy()
        .join(
            lookup.clone().lazy(),
            [col(matrix::FROM_SECTOR)],
            [col(industry::NAME)],
            JoinArgs::new(JoinType::Inner),
        )
        .rename([industry::INDUSTRY_ID], [trade::INDUSTRY1], true)
        .join(
            lookup.lazy(),
            [col(matrix::TO_SECTOR)],
            [col(industry::NAME)],
            JoinArgs::new(JoinType::Inner),
        )
        .rename([industry::INDUSTRY_ID], [trade::INDUSTRY2], true)
        .collect()?;

    let dropped = filtered.height() - recoded.height();
    if dropped > 0 {
        warn!(dropped, "flows dropped for sectors missing from the catalog");
    }

    let table = recoded
        .lazy()
        .group_by([
            col(matrix::FROM_REGION),
            col(matrix::TO_REGION),
            col(trade::INDUSTRY1),
            col(trade::INDUSTRY2),
        ])
        .agg([col(matrix::FLOW).sum()])
        .rename(
            [matrix::FROM_REGION, matrix::TO_REGION, matrix::FLOW],
            [trade::REGION1, trade::REGION2, trade::AMOUNT],
            true,
        )
        .with_columns([lit(spec.year as i64)
            .cast(DataType::Int64)
            .alias(trade::YEAR)])
        .sort(
            [
                trade::AMOUNT,
                trade::REGION1,
                trade::REGION2,
                trade::INDUSTRY1,
                trade::INDUSTRY2,
            ],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false, false, false, false]),
        )
        .with_row_index(trade::TRADE_ID, Some(1))
        .with_columns([col(trade::TRADE_ID).cast(DataType::Int64)])
        .select(trade::ALL.map(col))
        .collect()?;

    info!(rows = table.height(), "trade-flow table extracted");
    Ok(table)
}

/// The trade table schema with no rows. A run over a quiet corner of the
/// matrix is not an error.
pub fn empty_trade_table() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(trade::TRADE_ID.into(), Vec::<i64>::new()),
        Column::new(trade::YEAR.into(), Vec::<i64>::new()),
        Column::new(trade::REGION1.into(), Vec::<String>::new()),
        Column::new(trade::REGION2.into(), Vec::<String>::new()),
        Column::new(trade::INDUSTRY1.into(), Vec::<String>::new()),
        Column::new(trade::INDUSTRY2.into(), Vec::<String>::new()),
        Column::new(trade::AMOUNT.into(), Vec::<f64>::new()),
    ])?)
}

/// Extract the final-demand flow table for one run.
///
/// Same filter / threshold / recode pattern as the inter-industry extraction,
/// but only the producing side carries a sector; the consuming side is a
/// demand category, kept verbatim.
pub fn extract_final_demand(
    demand_matrix: &DemandMatrix,
    sectors: &SectorCatalog,
    spec: &RunSpec,
) -> Result<DataFrame> {
    let stacked = demand_matrix.stack()?;
    let country = spec.country.as_str();

    let filtered = stacked
        .lazy()
        .filter(direction_filter(spec.flow_type, country))
        .filter(col(matrix::FLOW).gt(lit(spec.flow_type.threshold())))
        .collect()?;

    if filtered.height() == 0 {
        info!(
            country,
            flow_type = %spec.flow_type,
            "no final-demand flows above threshold"
        );
        return empty_final_demand_table();
    }

    let recoded = filtered
        .clone()
        .lazy()
        .join(
            sectors.lookup_frame()?.lazy(),
            [col(matrix::FROM_SECTOR)],
            [col(industry::NAME)],
            JoinArgs::new(JoinType::Inner),
        )
        .rename([industry::INDUSTRY_ID], [trade::INDUSTRY1], true)
        .collect()?;

    let dropped = filtered.height() - recoded.height();
    if dropped > 0 {
        warn!(
            dropped,
            "final-demand flows dropped for sectors missing from the catalog"
        );
    }

    let table = recoded
        .lazy()
        .group_by([
            col(matrix::FROM_REGION),
            col(matrix::TO_REGION),
            col(trade::INDUSTRY1),
            col(demand::DEMAND_CATEGORY),
        ])
        .agg([col(matrix::FLOW).sum()])
        .rename(
            [matrix::FROM_REGION, matrix::TO_REGION, matrix::FLOW],
            [trade::REGION1, trade::REGION2, trade::AMOUNT],
            true,
        )
        .with_columns([
            lit(spec.year as i64).cast(DataType::Int64).alias(trade::YEAR),
            lit(FINAL_DEMAND_FLOW_TYPE).alias(demand::FLOW_TYPE),
        ])
        .sort(
            [
                trade::AMOUNT,
                trade::REGION1,
                trade::REGION2,
                trade::INDUSTRY1,
                demand::DEMAND_CATEGORY,
            ],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false, false, false, false]),
        )
        .with_row_index(demand::FLOW_ID, Some(1))
        .with_columns([col(demand::FLOW_ID).cast(DataType::Int64)])
        .select(demand::ALL.map(col))
        .collect()?;

    info!(rows = table.height(), "final-demand table extracted");
    Ok(table)
}

/// The final-demand schema with no rows.
pub fn empty_final_demand_table() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(demand::FLOW_ID.into(), Vec::<i64>::new()),
        Column::new(trade::YEAR.into(), Vec::<i64>::new()),
        Column::new(trade::REGION1.into(), Vec::<String>::new()),
        Column::new(trade::REGION2.into(), Vec::<String>::new()),
        Column::new(trade::INDUSTRY1.into(), Vec::<String>::new()),
        Column::new(demand::DEMAND_CATEGORY.into(), Vec::<String>::new()),
        Column::new(trade::AMOUNT.into(), Vec::<f64>::new()),
        Column::new(demand::FLOW_TYPE.into(), Vec::<String>::new()),
    ])?)
}
