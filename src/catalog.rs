//! Factor catalog: one row per satellite-account stressor, with a stable
//! numeric id, unit, and environmental context classification.

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, TradeError};
use crate::io;
use crate::mrio::MrioModel;
use crate::schema::{context, extension, factor};

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub factor_id: i64,
    pub unit: String,
    pub context: String,
    /// Leading substance name, e.g. "CO2" for "CO2 - combustion - air".
    pub name: String,
    /// Full stressor label as the satellite account spells it.
    pub stressor: String,
    pub extension: String,
}

/// All stressors across the model's extensions, ids assigned in a fixed
/// extension enumeration order so the catalog is reproducible across runs.
#[derive(Debug, Clone)]
pub struct FactorCatalog {
    factors: Vec<Factor>,
}

impl FactorCatalog {
    pub fn build(model: &MrioModel) -> Self {
        let mut factors = Vec::new();
        let mut next_id: i64 = 1;

        for ext_name in extension::ALL {
            let Some(ext) = model.extension(ext_name) else {
                debug!(extension = ext_name, "extension absent, skipping");
                continue;
            };
            for (idx, stressor) in ext.stressors().iter().enumerate() {
                factors.push(Factor {
                    factor_id: next_id,
                    unit: ext.unit(idx).to_string(),
                    context: derive_context(ext_name, stressor).to_string(),
                    name: derive_name(stressor).to_string(),
                    stressor: stressor.clone(),
                    extension: ext_name.to_string(),
                });
                next_id += 1;
            }
        }

        Self { factors }
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn by_id(&self, factor_id: i64) -> Option<&Factor> {
        self.factors.iter().find(|f| f.factor_id == factor_id)
    }

    /// Id lookup for callers resolving factors per row.
    pub fn id_index(&self) -> HashMap<i64, &Factor> {
        self.factors.iter().map(|f| (f.factor_id, f)).collect()
    }

    /// Derived-name lookup across the whole catalog. Names are not unique
    /// across stressors; the last catalog entry for a name wins, mirroring
    /// the persisted name → id mapping.
    pub fn name_index(&self) -> HashMap<&str, &Factor> {
        self.factors
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ids: Vec<i64> = self.factors.iter().map(|f| f.factor_id).collect();
        let units: Vec<String> = self.factors.iter().map(|f| f.unit.clone()).collect();
        let contexts: Vec<String> = self.factors.iter().map(|f| f.context.clone()).collect();
        let names: Vec<String> = self.factors.iter().map(|f| f.name.clone()).collect();
        let stressors: Vec<String> = self.factors.iter().map(|f| f.stressor.clone()).collect();
        let extensions: Vec<String> = self.factors.iter().map(|f| f.extension.clone()).collect();
        Ok(DataFrame::new(vec![
            Column::new(factor::FACTOR_ID.into(), &ids),
            Column::new(factor::UNIT.into(), &units),
            Column::new(factor::CONTEXT.into(), &contexts),
            Column::new(factor::NAME.into(), &names),
            Column::new(factor::STRESSOR.into(), &stressors),
            Column::new(factor::EXTENSION.into(), &extensions),
        ])?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        io::write_csv(path, &self.to_dataframe()?, None)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let df = io::read_csv_strings(path)?;
        io::require_columns(
            &df,
            &[
                factor::FACTOR_ID,
                factor::UNIT,
                factor::CONTEXT,
                factor::NAME,
                factor::STRESSOR,
                factor::EXTENSION,
            ],
        )?;
        let df = io::cast_i64(df, &[factor::FACTOR_ID])?;

        let ids = df.column(factor::FACTOR_ID)?.i64()?.clone();
        let units = df.column(factor::UNIT)?.str()?.clone();
        let contexts = df.column(factor::CONTEXT)?.str()?.clone();
        let names = df.column(factor::NAME)?.str()?.clone();
        let stressors = df.column(factor::STRESSOR)?.str()?.clone();
        let extensions = df.column(factor::EXTENSION)?.str()?.clone();

        let mut factors = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(id), Some(unit), Some(ctx), Some(name), Some(stressor), Some(ext)) = (
                ids.get(row),
                units.get(row),
                contexts.get(row),
                names.get(row),
                stressors.get(row),
                extensions.get(row),
            ) else {
                return Err(TradeError::InvalidData(format!(
                    "Null factor catalog field at row {row}"
                )));
            };
            factors.push(Factor {
                factor_id: id,
                unit: unit.to_string(),
                context: ctx.to_string(),
                name: name.to_string(),
                stressor: stressor.to_string(),
                extension: ext.to_string(),
            });
        }

        Ok(Self { factors })
    }
}

/// Classify a stressor into an environmental context. Suffixed names such as
/// "CO2 - combustion - air" are classified by their compartment suffix;
/// unsuffixed names fall back to the extension they came from.
pub fn derive_context(ext_name: &str, stressor: &str) -> String {
    if stressor.contains(" - ") {
        let suffix = stressor
            .rsplit(" - ")
            .next()
            .unwrap_or(stressor)
            .to_lowercase();
        if suffix.contains("air") {
            return context::EMISSION_AIR.to_string();
        }
        if suffix.contains("water") {
            return context::EMISSION_WATER.to_string();
        }
        if ext_name == extension::LAND || stressor.to_lowercase().contains("land") {
            return context::NATURAL_RESOURCE_LAND.to_string();
        }
        if ext_name == extension::ENERGY {
            return context::NATURAL_RESOURCE_ENERGY.to_string();
        }
        if ext_name == extension::MATERIAL {
            return context::NATURAL_RESOURCE_IN_GROUND.to_string();
        }
        if ext_name == extension::EMPLOYMENT {
            return context::ECONOMIC_EMPLOYMENT.to_string();
        }
        return format!("emission/{ext_name}");
    }

    match ext_name {
        extension::EMPLOYMENT => context::ECONOMIC_EMPLOYMENT.to_string(),
        extension::ENERGY => context::NATURAL_RESOURCE_ENERGY.to_string(),
        extension::LAND => context::NATURAL_RESOURCE_LAND.to_string(),
        extension::MATERIAL => context::NATURAL_RESOURCE_IN_GROUND.to_string(),
        extension::WATER => context::NATURAL_RESOURCE_WATER.to_string(),
        _ => context::EMISSION_AIR.to_string(),
    }
}

/// Substance name: everything before the first " - " separator.
pub fn derive_name(stressor: &str) -> &str {
    match stressor.split_once(" - ") {
        Some((head, _)) => head,
        None => stressor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mrio::{ExtensionMatrix, FlowMatrix};

    fn model_with(ext: ExtensionMatrix) -> MrioModel {
        let labels = vec![("DE".to_string(), "Wheat".to_string())];
        let flows = FlowMatrix::new(labels, vec![vec![1.0]]).unwrap();
        MrioModel {
            flows,
            extensions: vec![ext],
            final_demand: None,
        }
    }

    #[test]
    fn suffixed_stressors_classify_by_compartment() {
        assert_eq!(
            derive_context("air_emissions", "CO2 - combustion - air"),
            "emission/air"
        );
        assert_eq!(
            derive_context("air_emissions", "N - agriculture - water"),
            "emission/water"
        );
        // Unrecognized suffixes still classify by extension when one applies.
        assert_eq!(
            derive_context("energy", "Energy Carrier Net - NENE"),
            "natural_resource/energy"
        );
        assert_eq!(
            derive_context("water", "Water Consumption Blue - Agriculture"),
            "emission/water"
        );
    }

    #[test]
    fn bare_stressors_classify_by_extension() {
        assert_eq!(derive_context("employment", "Employment people"), "economic/employment");
        assert_eq!(derive_context("water", "Water Consumption Blue"), "natural_resource/water");
        assert_eq!(derive_context("material", "Domestic Extraction"), "natural_resource/in_ground");
        assert_eq!(derive_context("air_emissions", "CO2"), "emission/air");
    }

    #[test]
    fn name_is_leading_substance() {
        assert_eq!(derive_name("CO2 - combustion - air"), "CO2");
        assert_eq!(derive_name("Water Withdrawal Blue"), "Water Withdrawal Blue");
    }

    #[test]
    fn ids_are_one_based_and_sequential() {
        let ext = ExtensionMatrix::new(
            "air_emissions".to_string(),
            vec!["CO2 - combustion - air".to_string(), "CH4 - combustion - air".to_string()],
            vec!["kg".to_string(), "kg".to_string()],
            vec![("DE".to_string(), "Wheat".to_string())],
            vec![vec![1.0], vec![2.0]],
        )
        .unwrap();
        let catalog = FactorCatalog::build(&model_with(ext));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.factors()[0].factor_id, 1);
        assert_eq!(catalog.factors()[1].factor_id, 2);
        assert_eq!(catalog.factors()[0].name, "CO2");
        assert_eq!(catalog.by_id(2).unwrap().name, "CH4");
    }
}
