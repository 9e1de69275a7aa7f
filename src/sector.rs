//! Sector mapping: free-text MRIO sector names to fixed-width industry codes.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use polars::prelude::*;

use crate::error::{Result, TradeError};
use crate::io;
use crate::schema::industry;

/// Fixed industry-code width.
pub const CODE_LEN: usize = 5;

/// Generated codes are unique by construction; this caps the collision
/// retry loop so a pathological input fails loudly instead of spinning.
const MAX_COLLISION_ATTEMPTS: usize = 110;

/// Words carrying no signal for code derivation.
const STOP_WORDS: [&str; 8] = [
    "and", "of", "related", "to", "services", "products", "nec", "other",
];

/// Ordered category rules; the first rule whose keyword set matches wins.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    (
        "Agriculture",
        &[
            "crop", "plant", "agriculture", "cattle", "pig", "poultry", "meat", "milk", "wool",
            "manure",
        ],
    ),
    ("Forestry", &["forestry", "logging", "wood", "timber"]),
    ("Fishing", &["fish", "fishing"]),
    (
        "Mining",
        &[
            "coal", "petroleum", "crude", "gas", "mining", "ore", "anthracite", "lignite",
        ],
    ),
    ("Food Manufacturing", &["food", "beverage", "tobacco", "dairy"]),
    ("Textiles", &["textile", "clothing", "leather", "wearing"]),
    (
        "Chemicals",
        &["chemical", "pharmaceutical", "plastic", "rubber"],
    ),
    (
        "Metals",
        &["metal", "steel", "iron", "aluminum", "fabricated"],
    ),
    (
        "Machinery",
        &["machinery", "equipment", "computer", "electronic"],
    ),
    (
        "Transportation Equipment",
        &["transport", "motor", "vehicle", "aircraft", "ship"],
    ),
    ("Construction", &["construction", "building"]),
    ("Utilities", &["electricity", "gas supply", "water", "steam"]),
    ("Trade", &["wholesale", "retail", "trade", "repair"]),
    (
        "Accommodation & Food",
        &["accommodation", "hotel", "restaurant", "food service"],
    ),
    (
        "Information",
        &["information", "telecommunication", "publishing", "media"],
    ),
    ("Finance & Insurance", &["financial", "insurance", "bank"]),
    ("Real Estate", &["real estate", "rental", "leasing"]),
    (
        "Professional Services",
        &["professional", "technical", "scientific", "legal"],
    ),
    (
        "Administrative Services",
        &["administrative", "support", "waste", "management"],
    ),
    (
        "Public Administration",
        &["public", "administration", "defence", "government"],
    ),
    ("Education", &["education", "teaching"]),
    ("Health & Social", &["health", "medical", "social", "care"]),
    (
        "Arts & Recreation",
        &["arts", "entertainment", "recreation", "sport"],
    ),
];

const DEFAULT_CATEGORY: &str = "Other Services";

#[derive(Debug, Clone, PartialEq)]
pub struct SectorEntry {
    pub industry_id: String,
    pub name: String,
    pub category: String,
}

/// Mapping from source sector names to 5-character industry codes plus a
/// coarse category. Built once per dataset vintage and persisted; later
/// stages consume it read-only.
#[derive(Debug, Clone)]
pub struct SectorCatalog {
    entries: Vec<SectorEntry>,
    index: HashMap<String, String>,
}

impl SectorCatalog {
    /// Assign codes for a set of sector names.
    ///
    /// Collision resolution depends on assignment order, so names are sorted
    /// canonically (and deduplicated) first; a given name set always yields
    /// the same mapping no matter how the source enumerates its sectors.
    pub fn build(names: &[String]) -> Result<Self> {
        let mut sorted: Vec<&String> = names.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut entries = Vec::with_capacity(sorted.len());
        let mut used: HashSet<String> = HashSet::with_capacity(sorted.len());

        for (position, name) in sorted.iter().enumerate() {
            let candidate = derive_code(name, position);
            let code = resolve_collision(candidate, &used)?;
            used.insert(code.clone());
            entries.push(SectorEntry {
                industry_id: code,
                name: (*name).clone(),
                category: derive_category(name).to_string(),
            });
        }

        if used.len() != entries.len() {
            return Err(TradeError::Validation(format!(
                "Industry code collision left {} codes for {} sectors",
                used.len(),
                entries.len()
            )));
        }

        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<SectorEntry>) -> Self {
        let index = entries
            .iter()
            .map(|e| (e.name.clone(), e.industry_id.clone()))
            .collect();
        Self { entries, index }
    }

    pub fn industry_id(&self, sector: &str) -> Option<&str> {
        self.index.get(sector).map(String::as_str)
    }

    pub fn entries(&self) -> &[SectorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two-column lookup table (name, industry_id) for dataframe joins.
    pub fn lookup_frame(&self) -> Result<DataFrame> {
        let names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        let codes: Vec<String> = self.entries.iter().map(|e| e.industry_id.clone()).collect();
        Ok(DataFrame::new(vec![
            Column::new(industry::NAME.into(), &names),
            Column::new(industry::INDUSTRY_ID.into(), &codes),
        ])?)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let codes: Vec<String> = self.entries.iter().map(|e| e.industry_id.clone()).collect();
        let names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        let categories: Vec<String> = self.entries.iter().map(|e| e.category.clone()).collect();
        Ok(DataFrame::new(vec![
            Column::new(industry::INDUSTRY_ID.into(), &codes),
            Column::new(industry::NAME.into(), &names),
            Column::new(industry::CATEGORY.into(), &categories),
        ])?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        io::write_csv(path, &self.to_dataframe()?, None)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let df = io::read_csv_strings(path)?;
        io::require_columns(
            &df,
            &[industry::INDUSTRY_ID, industry::NAME, industry::CATEGORY],
        )?;

        let codes = df.column(industry::INDUSTRY_ID)?.str()?.clone();
        let names = df.column(industry::NAME)?.str()?.clone();
        let categories = df.column(industry::CATEGORY)?.str()?.clone();

        let mut entries = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(code), Some(name), Some(category)) =
                (codes.get(row), names.get(row), categories.get(row))
            else {
                return Err(TradeError::InvalidData(format!(
                    "Null industry catalog field at row {row}"
                )));
            };
            entries.push(SectorEntry {
                industry_id: code.to_string(),
                name: name.to_string(),
                category: category.to_string(),
            });
        }

        Ok(Self::from_entries(entries))
    }
}

/// Strip punctuation and stop-words, preserving word boundaries.
fn clean_name(sector: &str) -> String {
    let depunctuated: String = sector
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect();

    depunctuated
        .split_whitespace()
        .filter(|word| !STOP_WORDS.iter().any(|stop| word.eq_ignore_ascii_case(stop)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn take_upper(text: &str, len: usize) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(len)
        .collect()
}

/// Derive a candidate code: truncated clean name, acronym-prefixed when the
/// name is short, positional digits when even that falls short.
fn derive_code(sector: &str, position: usize) -> String {
    let clean = clean_name(sector);
    let words: Vec<&str> = clean.split_whitespace().collect();

    let mut candidate = take_upper(&clean, CODE_LEN);

    if candidate.chars().count() < CODE_LEN && words.len() > 1 {
        let acronym: String = words
            .iter()
            .filter_map(|word| word.chars().next())
            .take(3)
            .collect::<String>()
            .to_uppercase();
        let squashed: String = clean.chars().filter(|ch| !ch.is_whitespace()).collect();
        let tail: String = squashed.chars().skip(acronym.chars().count()).collect();
        candidate = take_upper(&format!("{acronym}{tail}"), CODE_LEN);
    }

    let have = candidate.chars().count();
    if have < CODE_LEN {
        let digits = format!("{:0width$}", position, width = CODE_LEN - have);
        candidate = format!("{candidate}{digits}")
            .chars()
            .take(CODE_LEN)
            .collect();
    }

    candidate
}

/// Mutate the candidate tail with an attempt counter until it is unused.
fn resolve_collision(candidate: String, used: &HashSet<String>) -> Result<String> {
    if !used.contains(&candidate) {
        return Ok(candidate);
    }

    let prefix4: String = candidate.chars().take(4).collect();
    let prefix3: String = candidate.chars().take(3).collect();

    for attempt in 1..MAX_COLLISION_ATTEMPTS {
        let mutated = if attempt < 10 {
            format!("{prefix4}{attempt}")
        } else {
            format!("{prefix3}{attempt:02}")
        };
        if !used.contains(&mutated) {
            return Ok(mutated);
        }
    }

    Err(TradeError::Validation(format!(
        "Unable to find a unique industry code for candidate {candidate}"
    )))
}

fn derive_category(sector: &str) -> &'static str {
    let lower = sector.to_lowercase();
    for (category, keywords) in CATEGORY_RULES {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return category;
        }
    }
    DEFAULT_CATEGORY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn codes_are_fixed_width_uppercase_and_distinct() {
        let catalog = SectorCatalog::build(&names(&[
            "Cultivation of wheat",
            "Cultivation of cereal grains nec",
            "Cultivation of paddy rice",
            "Extraction of crude petroleum and services related to crude oil extraction",
            "Production of electricity by coal",
            "Fishing, operating of fish hatcheries and fish farms",
        ]))
        .unwrap();

        let mut seen = HashSet::new();
        for entry in catalog.entries() {
            assert_eq!(entry.industry_id.chars().count(), CODE_LEN);
            assert!(entry
                .industry_id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            assert!(seen.insert(entry.industry_id.clone()));
        }
    }

    #[test]
    fn mapping_is_independent_of_input_order() {
        let forward = names(&["Cultivation of wheat", "Cultivation of vegetables", "Mining of coal"]);
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = SectorCatalog::build(&forward).unwrap();
        let b = SectorCatalog::build(&reversed).unwrap();

        for entry in a.entries() {
            assert_eq!(b.industry_id(&entry.name), Some(entry.industry_id.as_str()));
        }
    }

    #[test]
    fn collisions_are_resolved_with_counter_suffix() {
        let catalog = SectorCatalog::build(&names(&[
            "Cultivation abc",
            "Cultivation abd",
            "Cultivation abe",
        ]))
        .unwrap();

        let codes: HashSet<&str> = catalog
            .entries()
            .iter()
            .map(|e| e.industry_id.as_str())
            .collect();
        assert_eq!(codes.len(), 3);
        assert!(codes.contains("CULTI"));
    }

    #[test]
    fn unusable_name_falls_back_to_numeric_code() {
        let catalog = SectorCatalog::build(&names(&["***"])).unwrap();
        let entry = &catalog.entries()[0];
        assert_eq!(entry.industry_id, "00000");
    }

    #[test]
    fn categories_use_first_matching_rule() {
        assert_eq!(derive_category("Cultivation of wheat"), "Other Services");
        assert_eq!(derive_category("Cultivation of crops nec"), "Agriculture");
        assert_eq!(derive_category("Mining of coal and lignite"), "Mining");
        assert_eq!(derive_category("Quarrying of stone"), "Other Services");
    }

    #[test]
    fn short_names_are_padded_deterministically() {
        let catalog = SectorCatalog::build(&names(&["Gas"])).unwrap();
        assert_eq!(catalog.entries()[0].industry_id, "GAS00");
    }
}
