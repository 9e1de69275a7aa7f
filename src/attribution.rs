//! Factor attribution: join per-unit stressor coefficients onto trade flows
//! and materialize the impact of each (trade, factor) pair.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::{derive_name, Factor, FactorCatalog};
use crate::config::{AttributionMode, AttributionOptions};
use crate::error::Result;
use crate::mrio::MrioModel;
use crate::schema::{association, extension, industry, matrix, trade};
use crate::sector::SectorCatalog;

/// Stressor-name patterns that anchor selective mode: the major greenhouse
/// gases, employment, resource use, energy, and materials.
const PRIORITY_PATTERNS: [&str; 13] = [
    "CO2", "CH4", "N2O", "NOX", "SO2", "people", "hours", "Water", "Land", "Energy", "TJ",
    "Crop", "Metal",
];

/// Produce the trade-factor association table.
///
/// Coefficients apply to the producing side of each flow, so the join key is
/// (region1, industry1). The join runs in fixed-size trade chunks; the chunk
/// size bounds memory and never changes the output.
pub fn attribute_factors(
    trade: &DataFrame,
    model: &MrioModel,
    sectors: &SectorCatalog,
    catalog: &FactorCatalog,
    opts: &AttributionOptions,
) -> Result<DataFrame> {
    if trade.height() == 0 {
        return empty_associations();
    }

    let selected = match opts.mode {
        AttributionMode::Comprehensive => None,
        AttributionMode::Selective => {
            let ids = select_priority_factors(catalog, opts.factor_quota);
            info!(selected = ids.len(), quota = opts.factor_quota, "selective factor set");
            Some(ids)
        }
    };

    let name_index = catalog.name_index();
    let mut coefficient_frames: Vec<DataFrame> = Vec::new();
    for ext_name in extension::ALL {
        match coefficient_table(ext_name, model, sectors, &name_index, selected.as_ref()) {
            Ok(Some(frame)) => coefficient_frames.push(frame),
            Ok(None) => debug!(extension = ext_name, "no applicable coefficients"),
            Err(err) => warn!(extension = ext_name, %err, "extension skipped"),
        }
    }

    let Some(coefficients) = concat_frames(coefficient_frames)? else {
        return empty_associations();
    };

    // A zero chunk size would never advance the offset.
    let chunk_size = opts.chunk_size.max(1);
    let mut out: Option<DataFrame> = None;
    let mut offset: usize = 0;
    while offset < trade.height() {
        let chunk = trade.slice(offset as i64, chunk_size);
        offset += chunk.height();

        let joined = chunk
            .lazy()
            .join(
                coefficients.clone().lazy(),
                [col(trade::REGION1), col(trade::INDUSTRY1)],
                [col(matrix::REGION), col(industry::INDUSTRY_ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .with_columns([(col(trade::AMOUNT) * col(association::COEFFICIENT))
                .alias(association::IMPACT_VALUE)])
            .filter(
                col(association::IMPACT_VALUE)
                    .gt(lit(opts.impact_epsilon))
                    .or(col(association::IMPACT_VALUE).lt(lit(-opts.impact_epsilon))),
            )
            .select(association::ALL.map(col))
            .collect()?;

        out = match out {
            Some(acc) => Some(acc.vstack(&joined)?),
            None => Some(joined),
        };
    }

    let table = match out {
        Some(table) => table,
        None => return empty_associations(),
    };
    info!(rows = table.height(), "factor associations materialized");
    Ok(table)
}

/// Per-unit coefficients for one extension, keyed by (region, industry_id,
/// factor_id). Returns None when every cell is zero, unmapped, or deselected.
fn coefficient_table(
    ext_name: &str,
    model: &MrioModel,
    sectors: &SectorCatalog,
    name_index: &HashMap<&str, &Factor>,
    selected: Option<&HashSet<i64>>,
) -> Result<Option<DataFrame>> {
    let Some(ext) = model.extension(ext_name) else {
        return Ok(None);
    };

    let mut regions: Vec<&str> = Vec::new();
    let mut industries: Vec<&str> = Vec::new();
    let mut factor_ids: Vec<i64> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut unknown_stressors: usize = 0;
    let mut unmapped_sectors: usize = 0;

    for (stressor_idx, region, sector, coefficient) in ext.iter_nonzero() {
        let stressor = ext.stressors()[stressor_idx].as_str();
        let Some(factor) = name_index.get(derive_name(stressor)) else {
            unknown_stressors += 1;
            continue;
        };
        if let Some(keep) = selected {
            if !keep.contains(&factor.factor_id) {
                continue;
            }
        }
        let Some(industry_id) = sectors.industry_id(sector) else {
            unmapped_sectors += 1;
            continue;
        };
        regions.push(region);
        industries.push(industry_id);
        factor_ids.push(factor.factor_id);
        values.push(coefficient);
    }

    if unknown_stressors > 0 || unmapped_sectors > 0 {
        warn!(
            extension = ext_name,
            unknown_stressors, unmapped_sectors, "coefficient cells dropped"
        );
    }
    if factor_ids.is_empty() {
        return Ok(None);
    }

    let frame = DataFrame::new(vec![
        Column::new(matrix::REGION.into(), &regions),
        Column::new(industry::INDUSTRY_ID.into(), &industries),
        Column::new(association::FACTOR_ID.into(), &factor_ids),
        Column::new(association::COEFFICIENT.into(), &values),
    ])?;
    Ok(Some(frame))
}

/// Pick at most `quota` factor ids: priority-pattern matches first, then a
/// proportional top-up from each extension so no account is left out.
pub fn select_priority_factors(catalog: &FactorCatalog, quota: usize) -> HashSet<i64> {
    let mut ordered: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    'patterns: for pattern in PRIORITY_PATTERNS {
        let needle = pattern.to_lowercase();
        for factor in catalog.factors() {
            if factor.stressor.to_lowercase().contains(&needle) && seen.insert(factor.factor_id) {
                ordered.push(factor.factor_id);
                if ordered.len() >= quota {
                    break 'patterns;
                }
            }
        }
    }

    if ordered.len() < quota {
        let per_extension = ((quota - ordered.len()) / extension::ALL.len()).max(1);
        for ext_name in extension::ALL {
            let mut taken = 0;
            for factor in catalog.factors() {
                if factor.extension != ext_name || seen.contains(&factor.factor_id) {
                    continue;
                }
                seen.insert(factor.factor_id);
                ordered.push(factor.factor_id);
                taken += 1;
                if taken >= per_extension || ordered.len() >= quota {
                    break;
                }
            }
            if ordered.len() >= quota {
                break;
            }
        }
    }

    ordered.truncate(quota);
    ordered.into_iter().collect()
}

/// The association schema with no rows.
pub fn empty_associations() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(association::TRADE_ID.into(), Vec::<i64>::new()),
        Column::new(association::FACTOR_ID.into(), Vec::<i64>::new()),
        Column::new(association::COEFFICIENT.into(), Vec::<f64>::new()),
        Column::new(association::IMPACT_VALUE.into(), Vec::<f64>::new()),
    ])?)
}

fn concat_frames(frames: Vec<DataFrame>) -> Result<Option<DataFrame>> {
    let mut iter = frames.into_iter();
    let Some(mut acc) = iter.next() else {
        return Ok(None);
    };
    for frame in iter {
        acc = acc.vstack(&frame)?;
    }
    Ok(Some(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlowType, RunSpec};
    use crate::flows::extract_trade_flows;
    use crate::mrio::{ExtensionMatrix, FlowMatrix};

    fn sample_model() -> MrioModel {
        let labels = vec![
            ("DE".to_string(), "Crude oil".to_string()),
            ("US".to_string(), "Crude oil".to_string()),
            ("US".to_string(), "Electricity".to_string()),
        ];
        let flows = FlowMatrix::new(
            labels.clone(),
            vec![
                vec![0.0, 5.0, 100.0],
                vec![2.0, 0.5, 0.0],
                vec![0.0, 1.5, 3.0],
            ],
        )
        .unwrap();
        let air = ExtensionMatrix::new(
            extension::AIR_EMISSIONS,
            vec![
                "CO2 - combustion - air".to_string(),
                "CH4 - combustion - air".to_string(),
            ],
            vec!["kg".to_string(), "kg".to_string()],
            labels,
            vec![vec![0.5, 0.1, 0.2], vec![0.000001, 0.0, 0.0]],
        )
        .unwrap();
        MrioModel {
            flows,
            extensions: vec![air],
            final_demand: None,
        }
    }

    fn fixtures() -> (DataFrame, MrioModel, SectorCatalog, FactorCatalog) {
        let model = sample_model();
        let sectors = SectorCatalog::build(&[
            "Crude oil".to_string(),
            "Electricity".to_string(),
        ])
        .unwrap();
        let catalog = FactorCatalog::build(&model);
        let spec = RunSpec::new(2019, "US", FlowType::Imports);
        let trade = extract_trade_flows(&model.flows, &sectors, &spec).unwrap();
        (trade, model, sectors, catalog)
    }

    fn comprehensive() -> AttributionOptions {
        AttributionOptions {
            mode: AttributionMode::Comprehensive,
            ..AttributionOptions::default()
        }
    }

    #[test]
    fn impact_is_amount_times_coefficient() {
        let (trade, model, sectors, catalog) = fixtures();
        let out = attribute_factors(&trade, &model, &sectors, &catalog, &comprehensive()).unwrap();

        // Both DE->US flows carry the DE Crude oil CO2 coefficient 0.5; the
        // CH4 coefficient is too small to survive the epsilon filter.
        assert_eq!(out.height(), 2);
        let coeff = out.column(association::COEFFICIENT).unwrap().f64().unwrap();
        let impact = out.column(association::IMPACT_VALUE).unwrap().f64().unwrap();
        assert_eq!(coeff.get(0), Some(0.5));
        assert_eq!(impact.get(0), Some(50.0));
        assert_eq!(impact.get(1), Some(2.5));
    }

    #[test]
    fn tiny_impacts_are_dropped() {
        let (trade, model, sectors, catalog) = fixtures();
        let out = attribute_factors(&trade, &model, &sectors, &catalog, &comprehensive()).unwrap();

        let ch4_id = catalog
            .factors()
            .iter()
            .find(|f| f.name == "CH4")
            .unwrap()
            .factor_id;
        let ids = out.column(association::FACTOR_ID).unwrap().i64().unwrap();
        assert!(ids.into_iter().all(|id| id != Some(ch4_id)));
    }

    #[test]
    fn chunk_size_does_not_change_the_output() {
        let (trade, model, sectors, catalog) = fixtures();
        let whole = attribute_factors(&trade, &model, &sectors, &catalog, &comprehensive()).unwrap();
        for chunk_size in [0, 1] {
            let opts = AttributionOptions {
                chunk_size,
                ..comprehensive()
            };
            let chunked = attribute_factors(&trade, &model, &sectors, &catalog, &opts).unwrap();
            assert!(whole.equals(&chunked));
        }
    }

    #[test]
    fn stressors_missing_from_the_catalog_are_dropped() {
        let labels = vec![
            ("DE".to_string(), "Crude oil".to_string()),
            ("US".to_string(), "Crude oil".to_string()),
            ("US".to_string(), "Electricity".to_string()),
        ];
        let flows = FlowMatrix::new(
            labels.clone(),
            vec![
                vec![0.0, 5.0, 100.0],
                vec![2.0, 0.5, 0.0],
                vec![0.0, 1.5, 3.0],
            ],
        )
        .unwrap();
        let air = ExtensionMatrix::new(
            extension::AIR_EMISSIONS,
            vec![
                "CO2 - combustion - air".to_string(),
                "SOX - combustion - air".to_string(),
            ],
            vec!["kg".to_string(), "kg".to_string()],
            labels.clone(),
            vec![vec![0.5, 0.1, 0.2], vec![0.3, 0.0, 0.0]],
        )
        .unwrap();
        let model = MrioModel {
            flows,
            extensions: vec![air],
            final_demand: None,
        };

        // Catalog persisted before SOX was added to the dataset.
        let co2_only = ExtensionMatrix::new(
            extension::AIR_EMISSIONS,
            vec!["CO2 - combustion - air".to_string()],
            vec!["kg".to_string()],
            labels,
            vec![vec![0.5, 0.1, 0.2]],
        )
        .unwrap();
        let catalog = FactorCatalog::build(&MrioModel {
            flows: model.flows.clone(),
            extensions: vec![co2_only],
            final_demand: None,
        });

        let sectors = SectorCatalog::build(&[
            "Crude oil".to_string(),
            "Electricity".to_string(),
        ])
        .unwrap();
        let spec = RunSpec::new(2019, "US", FlowType::Imports);
        let trade = extract_trade_flows(&model.flows, &sectors, &spec).unwrap();

        let out = attribute_factors(&trade, &model, &sectors, &catalog, &comprehensive()).unwrap();

        // The SOX coefficient (0.3 on DE crude) is large enough to survive
        // the epsilon filter; only the missing catalog entry drops it.
        assert_eq!(out.height(), 2);
        let co2_id = catalog.factors()[0].factor_id;
        let ids = out.column(association::FACTOR_ID).unwrap().i64().unwrap();
        assert!(ids.into_iter().all(|id| id == Some(co2_id)));
    }

    #[test]
    fn empty_trade_table_yields_empty_associations() {
        let (_, model, sectors, catalog) = fixtures();
        let empty = crate::flows::empty_trade_table().unwrap();
        let out = attribute_factors(&empty, &model, &sectors, &catalog, &comprehensive()).unwrap();
        assert_eq!(out.height(), 0);
        assert_eq!(out.get_column_names_str(), association::ALL.to_vec());
    }

    #[test]
    fn priority_selection_prefers_greenhouse_gases() {
        let (_, model, _, _) = fixtures();
        let catalog = FactorCatalog::build(&model);
        let picked = select_priority_factors(&catalog, 1);

        let co2_id = catalog
            .factors()
            .iter()
            .find(|f| f.name == "CO2")
            .unwrap()
            .factor_id;
        assert_eq!(picked, HashSet::from([co2_id]));
    }

    #[test]
    fn selection_tops_up_from_every_extension() {
        let (_, model, _, _) = fixtures();
        let catalog = FactorCatalog::build(&model);
        // Quota above the pattern-match count pulls in the remaining factors.
        let picked = select_priority_factors(&catalog, 10);
        assert_eq!(picked.len(), catalog.len());
    }
}
