//! Per-trade impact roll-ups: the overall impact summary and the three-way
//! employment / resources / materials split.

use std::collections::{BTreeMap, HashSet};

use polars::prelude::*;
use tracing::info;

use crate::catalog::{Factor, FactorCatalog};
use crate::error::{Result, TradeError};
use crate::schema::{association, context, extension, impact, trade};

/// Named stressor groups reported alongside the per-extension totals. A
/// stressor may feed several groups; the columns are descriptive, not a
/// partition.
const KEYWORD_GROUPS: [(&str, &[&str]); 8] = [
    ("CO2_total", &["CO2", "CO2_bio"]),
    ("CH4_total", &["CH4"]),
    ("N2O_total", &["N2O"]),
    ("NOX_total", &["NOX", "NOx"]),
    (
        "Water_total",
        &["Water Consumption Blue", "Water Withdrawal Blue"],
    ),
    (
        "Employment_total",
        &["Employment people:", "Employment hours:"],
    ),
    ("Energy_total", &["Energy use"]),
    ("Land_total", &["Cropland", "Forest", "Artificial Surfaces"]),
];

/// In-ground stressors matching these are biotic and belong with the
/// renewable resources table, not materials.
const CROPS_KEYWORDS: [&str; 5] = [
    "Crops",
    "Primary Crops",
    "Agriculture",
    "Forestry",
    "Fishery",
];

/// The three disjoint resource tables. Air emissions stay out of all of
/// them; they are covered by the overall impact summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Employment,
    Resources,
    Materials,
}

/// Classify a factor into exactly one resource table, or none for air
/// emissions.
pub fn resource_class(factor: &Factor) -> Option<ResourceClass> {
    match factor.context.as_str() {
        context::ECONOMIC_EMPLOYMENT => Some(ResourceClass::Employment),
        context::EMISSION_WATER
        | context::NATURAL_RESOURCE_WATER
        | context::NATURAL_RESOURCE_LAND
        | context::NATURAL_RESOURCE_ENERGY => Some(ResourceClass::Resources),
        context::NATURAL_RESOURCE_IN_GROUND => {
            if matches_any(&factor.stressor, &CROPS_KEYWORDS) {
                Some(ResourceClass::Resources)
            } else {
                Some(ResourceClass::Materials)
            }
        }
        _ => None,
    }
}

struct CategorySpec {
    name: &'static str,
    class: ResourceClass,
    contexts: &'static [&'static str],
    subcategories: &'static [(&'static str, &'static [&'static str])],
}

const CATEGORY_SPECS: [CategorySpec; 3] = [
    CategorySpec {
        name: "employment",
        class: ResourceClass::Employment,
        contexts: &[context::ECONOMIC_EMPLOYMENT],
        subcategories: &[
            ("People", &["Employment people:"]),
            ("Hours", &["Employment hours:"]),
        ],
    },
    CategorySpec {
        name: "resources",
        class: ResourceClass::Resources,
        contexts: &[
            context::EMISSION_WATER,
            context::NATURAL_RESOURCE_WATER,
            context::NATURAL_RESOURCE_LAND,
            context::NATURAL_RESOURCE_ENERGY,
            context::NATURAL_RESOURCE_IN_GROUND,
        ],
        subcategories: &[
            ("Water_Consumption", &["Water Consumption"]),
            ("Water_Withdrawal", &["Water Withdrawal"]),
            ("Energy", &["Energy use"]),
            ("Land_Crops", &["Cropland"]),
            ("Land_Forest", &["Forest"]),
            ("Land_Other", &["Artificial", "meadows", "pastures"]),
            ("Crops", &["Primary Crops", "Agriculture"]),
        ],
    },
    CategorySpec {
        name: "materials",
        class: ResourceClass::Materials,
        contexts: &[context::NATURAL_RESOURCE_IN_GROUND],
        subcategories: &[
            ("Metals", &["Metal Ores"]),
            ("Minerals", &["Non-Metallic Minerals"]),
            ("Fossil", &["Fossil Fuels"]),
            ("Other_Materials", &["Extraction"]),
        ],
    },
];

/// The employment / resources / materials tables, one row per trade flow.
#[derive(Debug)]
pub struct ResourceTables {
    pub employment: DataFrame,
    pub resources: DataFrame,
    pub materials: DataFrame,
}

#[derive(Default)]
struct TradeAgg {
    total: f64,
    count: i64,
    unique: HashSet<i64>,
    buckets: Vec<f64>,
}

fn matches_any(stressor: &str, keywords: &[&str]) -> bool {
    let lower = stressor.to_lowercase();
    keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
}

/// One decoded association row.
struct AssociationRow {
    trade_id: i64,
    factor_id: i64,
    impact_value: f64,
}

fn association_rows(associations: &DataFrame) -> Result<Vec<AssociationRow>> {
    let trade_ids = associations.column(association::TRADE_ID)?.i64()?;
    let factor_ids = associations.column(association::FACTOR_ID)?.i64()?;
    let impacts = associations.column(association::IMPACT_VALUE)?.f64()?;

    let mut rows = Vec::with_capacity(associations.height());
    for idx in 0..associations.height() {
        let (Some(trade_id), Some(factor_id)) = (trade_ids.get(idx), factor_ids.get(idx)) else {
            return Err(TradeError::InvalidData(format!(
                "Null association key at row {idx}"
            )));
        };
        rows.push(AssociationRow {
            trade_id,
            factor_id,
            impact_value: impacts.get(idx).unwrap_or(0.0),
        });
    }
    Ok(rows)
}

/// Build the per-trade impact summary: every trade row, with totals, factor
/// counts, per-extension totals, named stressor groups, and an intensity
/// relative to the traded amount.
pub fn summarize_impacts(
    trade: &DataFrame,
    associations: &DataFrame,
    catalog: &FactorCatalog,
) -> Result<DataFrame> {
    let rows = association_rows(associations)?;
    let by_id = catalog.id_index();
    let bucket_count = extension::ALL.len() + KEYWORD_GROUPS.len();

    let mut aggs: BTreeMap<i64, TradeAgg> = BTreeMap::new();
    for row in &rows {
        let Some(factor) = by_id.get(&row.factor_id) else {
            continue;
        };
        let agg = aggs.entry(row.trade_id).or_insert_with(|| TradeAgg {
            buckets: vec![0.0; bucket_count],
            ..TradeAgg::default()
        });
        agg.total += row.impact_value;
        agg.count += 1;
        agg.unique.insert(row.factor_id);
        if let Some(pos) = extension::ALL.iter().position(|e| *e == factor.extension) {
            agg.buckets[pos] += row.impact_value;
        }
        for (group_idx, (_, keywords)) in KEYWORD_GROUPS.iter().enumerate() {
            if matches_any(&factor.stressor, keywords) {
                agg.buckets[extension::ALL.len() + group_idx] += row.impact_value;
            }
        }
    }

    let mut bucket_names: Vec<&str> = extension::ALL.to_vec();
    bucket_names.extend(KEYWORD_GROUPS.iter().map(|(name, _)| *name));

    let summary = agg_frame(
        &aggs,
        impact::TOTAL_IMPACT_VALUE,
        impact::FACTOR_COUNT,
        impact::UNIQUE_FACTORS,
        &bucket_names,
    )?;

    let table = join_onto_trade(
        trade,
        summary,
        impact::TOTAL_IMPACT_VALUE,
        &[impact::FACTOR_COUNT, impact::UNIQUE_FACTORS],
        &bucket_names,
        impact::IMPACT_INTENSITY,
    )?;
    info!(rows = table.height(), "impact summary built");
    Ok(table)
}

/// Split impacts into the three disjoint resource tables. Every trade row
/// appears in every table; the three totals sum to the classified impact
/// total.
pub fn split_resources(
    trade: &DataFrame,
    associations: &DataFrame,
    catalog: &FactorCatalog,
) -> Result<ResourceTables> {
    let rows = association_rows(associations)?;
    let by_id = catalog.id_index();
    let mut tables: Vec<DataFrame> = Vec::with_capacity(CATEGORY_SPECS.len());

    for spec in &CATEGORY_SPECS {
        let bucket_count = spec.contexts.len() + spec.subcategories.len();
        let mut aggs: BTreeMap<i64, TradeAgg> = BTreeMap::new();

        for row in &rows {
            let Some(factor) = by_id.get(&row.factor_id) else {
                continue;
            };
            if resource_class(factor) != Some(spec.class) {
                continue;
            }
            let agg = aggs.entry(row.trade_id).or_insert_with(|| TradeAgg {
                buckets: vec![0.0; bucket_count],
                ..TradeAgg::default()
            });
            agg.total += row.impact_value;
            agg.count += 1;
            agg.unique.insert(row.factor_id);
            if let Some(pos) = spec.contexts.iter().position(|c| *c == factor.context) {
                agg.buckets[pos] += row.impact_value;
            }
            for (idx, (_, keywords)) in spec.subcategories.iter().enumerate() {
                if matches_any(&factor.stressor, keywords) {
                    agg.buckets[spec.contexts.len() + idx] += row.impact_value;
                }
            }
        }

        let total_col = format!("total_{}_value", spec.name);
        let count_col = format!("{}_count", spec.name);
        let unique_col = format!("unique_{}_factors", spec.name);
        let intensity_col = format!("{}_intensity", spec.name);
        let subcat_cols: Vec<String> = spec
            .subcategories
            .iter()
            .map(|(subcat, _)| format!("{}_{}", spec.name, subcat))
            .collect();
        let mut bucket_names: Vec<&str> = spec.contexts.to_vec();
        bucket_names.extend(subcat_cols.iter().map(String::as_str));

        let summary = agg_frame(&aggs, &total_col, &count_col, &unique_col, &bucket_names)?;
        let table = join_onto_trade(
            trade,
            summary,
            &total_col,
            &[count_col.as_str(), unique_col.as_str()],
            &bucket_names,
            &intensity_col,
        )?;
        tables.push(table);
    }

    let materials = tables.pop().unwrap_or_default();
    let resources = tables.pop().unwrap_or_default();
    let employment = tables.pop().unwrap_or_default();
    Ok(ResourceTables {
        employment,
        resources,
        materials,
    })
}

/// Materialize per-trade aggregates as a joinable frame.
fn agg_frame(
    aggs: &BTreeMap<i64, TradeAgg>,
    total_col: &str,
    count_col: &str,
    unique_col: &str,
    bucket_names: &[&str],
) -> Result<DataFrame> {
    let trade_ids: Vec<i64> = aggs.keys().copied().collect();
    let totals: Vec<f64> = aggs.values().map(|a| a.total).collect();
    let counts: Vec<i64> = aggs.values().map(|a| a.count).collect();
    let uniques: Vec<i64> = aggs.values().map(|a| a.unique.len() as i64).collect();

    let mut columns = vec![
        Column::new(trade::TRADE_ID.into(), &trade_ids),
        Column::new(total_col.into(), &totals),
        Column::new(count_col.into(), &counts),
        Column::new(unique_col.into(), &uniques),
    ];
    for (idx, name) in bucket_names.iter().enumerate() {
        let values: Vec<f64> = aggs.values().map(|a| a.buckets[idx]).collect();
        columns.push(Column::new((*name).into(), &values));
    }
    Ok(DataFrame::new(columns)?)
}

/// Left-join a per-trade summary onto the trade table, zero-fill trades with
/// no matching factors, derive the intensity column, and order by the total
/// descending.
fn join_onto_trade(
    trade: &DataFrame,
    summary: DataFrame,
    total_col: &str,
    count_cols: &[&str],
    bucket_names: &[&str],
    intensity_col: &str,
) -> Result<DataFrame> {
    let mut fills: Vec<Expr> = vec![col(total_col).fill_null(lit(0.0))];
    for name in count_cols {
        fills.push(col(*name).fill_null(lit(0i64)));
    }
    for name in bucket_names {
        fills.push(col(*name).fill_null(lit(0.0)));
    }

    let table = trade
        .clone()
        .lazy()
        .join(
            summary.lazy(),
            [col(trade::TRADE_ID)],
            [col(trade::TRADE_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(fills)
        .with_columns([when(col(trade::AMOUNT).gt(lit(0.0)))
            .then(col(total_col) / col(trade::AMOUNT))
            .otherwise(lit(0.0))
            .alias(intensity_col)])
        .sort(
            [total_col, trade::TRADE_ID],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;
    Ok(table)
}
