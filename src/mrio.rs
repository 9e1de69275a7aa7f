//! In-memory MRIO structures: the square inter-industry flow matrix and the
//! per-extension satellite coefficient matrices.
//!
//! Acquisition and parsing of the raw dataset archives is out of scope; the
//! loaders here consume pre-flattened long-form CSVs and rebuild the dense
//! matrices the pipeline stages expect.

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, TradeError};
use crate::io;
use crate::schema::{demand, extension, matrix};

/// The square inter-industry flow matrix, indexed by (region, sector) on
/// both axes.
#[derive(Debug, Clone)]
pub struct FlowMatrix {
    labels: Vec<(String, String)>,
    values: Vec<Vec<f64>>,
}

impl FlowMatrix {
    pub fn new(labels: Vec<(String, String)>, values: Vec<Vec<f64>>) -> Result<Self> {
        let n = labels.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(TradeError::InvalidData(format!(
                "Flow matrix must be square over {n} (region, sector) labels"
            )));
        }
        Ok(Self { labels, values })
    }

    /// Distinct sector names in matrix index order.
    pub fn sectors(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for (_, sector) in &self.labels {
            if !seen.iter().any(|s| s == sector) {
                seen.push(sector.clone());
            }
        }
        seen
    }

    /// Reshape the two-level-indexed square matrix into long relational form:
    /// one row per (from_region, from_sector, to_region, to_sector, flow).
    pub fn stack(&self) -> Result<DataFrame> {
        let n = self.labels.len();
        let mut from_region = Vec::with_capacity(n * n);
        let mut from_sector = Vec::with_capacity(n * n);
        let mut to_region = Vec::with_capacity(n * n);
        let mut to_sector = Vec::with_capacity(n * n);
        let mut flow = Vec::with_capacity(n * n);

        for (i, (src_region, src_sector)) in self.labels.iter().enumerate() {
            for (j, (dst_region, dst_sector)) in self.labels.iter().enumerate() {
                from_region.push(src_region.clone());
                from_sector.push(src_sector.clone());
                to_region.push(dst_region.clone());
                to_sector.push(dst_sector.clone());
                flow.push(self.values[i][j]);
            }
        }

        let df = DataFrame::new(vec![
            Column::new(matrix::FROM_REGION.into(), &from_region),
            Column::new(matrix::FROM_SECTOR.into(), &from_sector),
            Column::new(matrix::TO_REGION.into(), &to_region),
            Column::new(matrix::TO_SECTOR.into(), &to_sector),
            Column::new(matrix::FLOW.into(), &flow),
        ])?;

        Ok(df)
    }

    /// Rebuild the dense matrix from long form. Cells absent from the input
    /// are zero.
    pub fn from_long(df: &DataFrame) -> Result<Self> {
        io::require_columns(
            df,
            &[
                matrix::FROM_REGION,
                matrix::FROM_SECTOR,
                matrix::TO_REGION,
                matrix::TO_SECTOR,
                matrix::FLOW,
            ],
        )?;

        let from_region = df.column(matrix::FROM_REGION)?.str()?;
        let from_sector = df.column(matrix::FROM_SECTOR)?.str()?;
        let to_region = df.column(matrix::TO_REGION)?.str()?;
        let to_sector = df.column(matrix::TO_SECTOR)?.str()?;
        let flow = df.column(matrix::FLOW)?.f64()?;

        let mut labels: Vec<(String, String)> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut get_or_insert = |labels: &mut Vec<(String, String)>,
                                 index: &mut HashMap<(String, String), usize>,
                                 region: &str,
                                 sector: &str|
         -> usize {
            let key = (region.to_string(), sector.to_string());
            *index.entry(key.clone()).or_insert_with(|| {
                labels.push(key);
                labels.len() - 1
            })
        };

        let mut cells: Vec<(usize, usize, f64)> = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(fr), Some(fs), Some(tr), Some(ts)) = (
                from_region.get(row),
                from_sector.get(row),
                to_region.get(row),
                to_sector.get(row),
            ) else {
                return Err(TradeError::InvalidData(format!(
                    "Null matrix label at row {row}"
                )));
            };
            let value = flow.get(row).unwrap_or(0.0);
            let i = get_or_insert(&mut labels, &mut index, fr, fs);
            let j = get_or_insert(&mut labels, &mut index, tr, ts);
            cells.push((i, j, value));
        }

        let n = labels.len();
        let mut values = vec![vec![0.0f64; n]; n];
        for (i, j, value) in cells {
            values[i][j] = value;
        }

        Self::new(labels, values)
    }
}

/// The final-demand matrix: (region, sector) producer rows against
/// (region, demand category) consumer columns.
#[derive(Debug, Clone)]
pub struct DemandMatrix {
    rows: Vec<(String, String)>,
    columns: Vec<(String, String)>,
    values: Vec<Vec<f64>>,
}

impl DemandMatrix {
    pub fn new(
        rows: Vec<(String, String)>,
        columns: Vec<(String, String)>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if values.len() != rows.len() || values.iter().any(|row| row.len() != columns.len()) {
            return Err(TradeError::InvalidData(
                "Demand matrix cells must align with producer rows and demand columns".to_string(),
            ));
        }
        Ok(Self {
            rows,
            columns,
            values,
        })
    }

    /// Reshape into long relational form: one row per
    /// (from_region, from_sector, to_region, demand_category, flow).
    pub fn stack(&self) -> Result<DataFrame> {
        let cells = self.rows.len() * self.columns.len();
        let mut from_region = Vec::with_capacity(cells);
        let mut from_sector = Vec::with_capacity(cells);
        let mut to_region = Vec::with_capacity(cells);
        let mut category = Vec::with_capacity(cells);
        let mut flow = Vec::with_capacity(cells);

        for (i, (src_region, src_sector)) in self.rows.iter().enumerate() {
            for (j, (dst_region, dst_category)) in self.columns.iter().enumerate() {
                from_region.push(src_region.clone());
                from_sector.push(src_sector.clone());
                to_region.push(dst_region.clone());
                category.push(dst_category.clone());
                flow.push(self.values[i][j]);
            }
        }

        Ok(DataFrame::new(vec![
            Column::new(matrix::FROM_REGION.into(), &from_region),
            Column::new(matrix::FROM_SECTOR.into(), &from_sector),
            Column::new(matrix::TO_REGION.into(), &to_region),
            Column::new(demand::DEMAND_CATEGORY.into(), &category),
            Column::new(matrix::FLOW.into(), &flow),
        ])?)
    }

    /// Rebuild the dense matrix from long form. Cells absent from the input
    /// are zero.
    pub fn from_long(df: &DataFrame) -> Result<Self> {
        io::require_columns(
            df,
            &[
                matrix::FROM_REGION,
                matrix::FROM_SECTOR,
                matrix::TO_REGION,
                demand::DEMAND_CATEGORY,
                matrix::FLOW,
            ],
        )?;

        let from_region = df.column(matrix::FROM_REGION)?.str()?;
        let from_sector = df.column(matrix::FROM_SECTOR)?.str()?;
        let to_region = df.column(matrix::TO_REGION)?.str()?;
        let category = df.column(demand::DEMAND_CATEGORY)?.str()?;
        let flow = df.column(matrix::FLOW)?.f64()?;

        let mut rows: Vec<(String, String)> = Vec::new();
        let mut row_index: HashMap<(String, String), usize> = HashMap::new();
        let mut columns: Vec<(String, String)> = Vec::new();
        let mut col_index: HashMap<(String, String), usize> = HashMap::new();
        let mut cells: Vec<(usize, usize, f64)> = Vec::with_capacity(df.height());

        for idx in 0..df.height() {
            let (Some(fr), Some(fs), Some(tr), Some(dc)) = (
                from_region.get(idx),
                from_sector.get(idx),
                to_region.get(idx),
                category.get(idx),
            ) else {
                return Err(TradeError::InvalidData(format!(
                    "Null demand label at row {idx}"
                )));
            };
            let value = flow.get(idx).unwrap_or(0.0);

            let row_key = (fr.to_string(), fs.to_string());
            let i = *row_index.entry(row_key.clone()).or_insert_with(|| {
                rows.push(row_key);
                rows.len() - 1
            });
            let col_key = (tr.to_string(), dc.to_string());
            let j = *col_index.entry(col_key.clone()).or_insert_with(|| {
                columns.push(col_key);
                columns.len() - 1
            });
            cells.push((i, j, value));
        }

        let mut values = vec![vec![0.0f64; columns.len()]; rows.len()];
        for (i, j, value) in cells {
            values[i][j] = value;
        }

        Self::new(rows, columns, values)
    }
}

/// One satellite extension: a coefficient matrix with stressor rows and
/// (region, sector) columns, plus per-row unit metadata.
#[derive(Debug, Clone)]
pub struct ExtensionMatrix {
    pub name: String,
    stressors: Vec<String>,
    units: Vec<String>,
    columns: Vec<(String, String)>,
    values: Vec<Vec<f64>>,
}

impl ExtensionMatrix {
    pub fn new(
        name: impl Into<String>,
        stressors: Vec<String>,
        units: Vec<String>,
        columns: Vec<(String, String)>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if units.len() != stressors.len()
            || values.len() != stressors.len()
            || values.iter().any(|row| row.len() != columns.len())
        {
            return Err(TradeError::InvalidData(
                "Extension matrix rows must align with stressors and columns".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            stressors,
            units,
            columns,
            values,
        })
    }

    /// Stressor names in matrix row order.
    pub fn stressors(&self) -> &[String] {
        &self.stressors
    }

    pub fn unit(&self, stressor_idx: usize) -> &str {
        &self.units[stressor_idx]
    }

    /// Iterate non-zero coefficient cells as
    /// (stressor index, region, sector, coefficient).
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, &str, &str, f64)> {
        self.values.iter().enumerate().flat_map(move |(i, row)| {
            row.iter().enumerate().filter_map(move |(j, &value)| {
                if value != 0.0 {
                    let (region, sector) = &self.columns[j];
                    Some((i, region.as_str(), sector.as_str(), value))
                } else {
                    None
                }
            })
        })
    }

    /// Rebuild from long form
    /// (stressor, unit, region, sector, coefficient); the unit column is
    /// optional and defaults to "unknown".
    pub fn from_long(name: impl Into<String>, df: &DataFrame) -> Result<Self> {
        io::require_columns(
            df,
            &[
                matrix::STRESSOR,
                matrix::REGION,
                matrix::SECTOR,
                matrix::COEFFICIENT,
            ],
        )?;

        let stressor_col = df.column(matrix::STRESSOR)?.str()?.clone();
        let region_col = df.column(matrix::REGION)?.str()?.clone();
        let sector_col = df.column(matrix::SECTOR)?.str()?.clone();
        let coeff_col = df.column(matrix::COEFFICIENT)?.f64()?.clone();
        let unit_col = match df.column(matrix::UNIT) {
            Ok(column) => Some(column.str()?.clone()),
            Err(_) => None,
        };

        let mut stressors: Vec<String> = Vec::new();
        let mut units: Vec<String> = Vec::new();
        let mut row_index: HashMap<String, usize> = HashMap::new();
        let mut columns: Vec<(String, String)> = Vec::new();
        let mut col_index: HashMap<(String, String), usize> = HashMap::new();
        let mut cells: Vec<(usize, usize, f64)> = Vec::with_capacity(df.height());

        for row in 0..df.height() {
            let (Some(stressor), Some(region), Some(sector)) = (
                stressor_col.get(row),
                region_col.get(row),
                sector_col.get(row),
            ) else {
                return Err(TradeError::InvalidData(format!(
                    "Null extension label at row {row}"
                )));
            };
            let value = coeff_col.get(row).unwrap_or(0.0);
            let unit = unit_col
                .as_ref()
                .and_then(|c| c.get(row))
                .unwrap_or("unknown");

            let i = match row_index.get(stressor) {
                Some(&i) => i,
                None => {
                    row_index.insert(stressor.to_string(), stressors.len());
                    stressors.push(stressor.to_string());
                    units.push(unit.to_string());
                    stressors.len() - 1
                }
            };
            let key = (region.to_string(), sector.to_string());
            let j = match col_index.get(&key) {
                Some(&j) => j,
                None => {
                    col_index.insert(key.clone(), columns.len());
                    columns.push(key);
                    columns.len() - 1
                }
            };
            cells.push((i, j, value));
        }

        let mut values = vec![vec![0.0f64; columns.len()]; stressors.len()];
        for (i, j, value) in cells {
            values[i][j] = value;
        }

        Self::new(name, stressors, units, columns, values)
    }
}

/// A fully-parsed MRIO model: the flow matrix plus whichever extensions the
/// dataset vintage provides.
#[derive(Debug, Clone)]
pub struct MrioModel {
    pub flows: FlowMatrix,
    pub extensions: Vec<ExtensionMatrix>,
    pub final_demand: Option<DemandMatrix>,
}

impl MrioModel {
    pub fn extension(&self, name: &str) -> Option<&ExtensionMatrix> {
        self.extensions.iter().find(|ext| ext.name == name)
    }

    /// Load a model from a directory of long-form CSVs: `flows.csv`, an
    /// optional `final_demand.csv`, plus one `<extension>.csv` per available
    /// extension. The flow matrix is required; everything else is skipped
    /// when absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let flows_path = dir.join("flows.csv");
        let flows_df = io::read_csv_strings(&flows_path)?;
        let flows_df = io::cast_f64(flows_df, &[matrix::FLOW])?;
        let flows = FlowMatrix::from_long(&flows_df)?;

        let demand_path = dir.join("final_demand.csv");
        let final_demand = if demand_path.exists() {
            let df = io::read_csv_strings(&demand_path)?;
            let df = io::cast_f64(df, &[matrix::FLOW])?;
            Some(DemandMatrix::from_long(&df)?)
        } else {
            debug!("final-demand table not present, skipping");
            None
        };

        let mut extensions = Vec::new();
        for name in extension::ALL {
            let path = dir.join(format!("{name}.csv"));
            if !path.exists() {
                debug!(extension = name, "extension table not present, skipping");
                continue;
            }
            let df = io::read_csv_strings(&path)?;
            let df = io::cast_f64(df, &[matrix::COEFFICIENT])?;
            extensions.push(ExtensionMatrix::from_long(name, &df)?);
        }

        Ok(Self {
            flows,
            extensions,
            final_demand,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> FlowMatrix {
        FlowMatrix::new(
            vec![
                ("DE".to_string(), "Crude oil".to_string()),
                ("US".to_string(), "Crude oil".to_string()),
                ("US".to_string(), "Electricity".to_string()),
            ],
            vec![
                vec![0.0, 5.0, 100.0],
                vec![2.0, 0.5, 0.0],
                vec![0.0, 1.5, 3.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn stack_produces_one_row_per_cell() {
        let df = sample_matrix().stack().unwrap();
        assert_eq!(df.height(), 9);

        let flow = df.column(matrix::FLOW).unwrap().f64().unwrap();
        assert_eq!(flow.get(2), Some(100.0));
    }

    #[test]
    fn long_roundtrip_preserves_cells() {
        let matrix = sample_matrix();
        let long = matrix.stack().unwrap();
        let rebuilt = FlowMatrix::from_long(&long).unwrap();
        assert_eq!(rebuilt.labels, matrix.labels);
        assert_eq!(rebuilt.values, matrix.values);
    }

    #[test]
    fn sectors_are_distinct_in_index_order() {
        assert_eq!(sample_matrix().sectors(), vec!["Crude oil", "Electricity"]);
    }

    #[test]
    fn non_square_matrix_is_rejected() {
        let err = FlowMatrix::new(
            vec![("DE".to_string(), "Crude oil".to_string())],
            vec![vec![1.0, 2.0]],
        )
        .unwrap_err();
        assert!(matches!(err, TradeError::InvalidData(_)));
    }

    #[test]
    fn demand_long_roundtrip_preserves_cells() {
        let matrix = DemandMatrix::new(
            vec![("DE".to_string(), "Crude oil".to_string())],
            vec![
                ("US".to_string(), "Final consumption expenditure".to_string()),
                ("US".to_string(), "Gross fixed capital formation".to_string()),
            ],
            vec![vec![4.0, 0.0]],
        )
        .unwrap();

        let long = matrix.stack().unwrap();
        assert_eq!(long.height(), 2);

        let rebuilt = DemandMatrix::from_long(&long).unwrap();
        assert_eq!(rebuilt.rows, matrix.rows);
        assert_eq!(rebuilt.columns, matrix.columns);
        assert_eq!(rebuilt.values, matrix.values);
    }

    #[test]
    fn iter_nonzero_skips_zero_coefficients() {
        let ext = ExtensionMatrix::new(
            "air_emissions",
            vec!["CO2 - combustion - air".to_string()],
            vec!["kg".to_string()],
            vec![
                ("DE".to_string(), "Crude oil".to_string()),
                ("US".to_string(), "Crude oil".to_string()),
            ],
            vec![vec![0.5, 0.0]],
        )
        .unwrap();

        let cells: Vec<_> = ext.iter_nonzero().collect();
        assert_eq!(cells, vec![(0, "DE", "Crude oil", 0.5)]);
    }
}
