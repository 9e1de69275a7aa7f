/// Column-name constants for exio-tradekit tables.
/// Single source of truth for every CSV the pipeline reads or writes.

// ── Trade flow columns ──────────────────────────────────────────────────────
pub mod trade {
    pub const TRADE_ID: &str = "trade_id";
    pub const YEAR: &str = "year";
    pub const REGION1: &str = "region1";
    pub const REGION2: &str = "region2";
    pub const INDUSTRY1: &str = "industry1";
    pub const INDUSTRY2: &str = "industry2";
    pub const AMOUNT: &str = "amount";

    pub const ALL: [&str; 7] = [
        TRADE_ID, YEAR, REGION1, REGION2, INDUSTRY1, INDUSTRY2, AMOUNT,
    ];
}

// ── Final-demand flow columns ───────────────────────────────────────────────
pub mod demand {
    pub const FLOW_ID: &str = "flow_id";
    pub const DEMAND_CATEGORY: &str = "demand_category";
    pub const FLOW_TYPE: &str = "flow_type";

    pub const ALL: [&str; 8] = [
        FLOW_ID,
        super::trade::YEAR,
        super::trade::REGION1,
        super::trade::REGION2,
        super::trade::INDUSTRY1,
        DEMAND_CATEGORY,
        super::trade::AMOUNT,
        FLOW_TYPE,
    ];
}

// ── Industry catalog columns ────────────────────────────────────────────────
pub mod industry {
    pub const INDUSTRY_ID: &str = "industry_id";
    pub const NAME: &str = "name";
    pub const CATEGORY: &str = "category";
}

// ── Factor catalog columns ──────────────────────────────────────────────────
pub mod factor {
    pub const FACTOR_ID: &str = "factor_id";
    pub const UNIT: &str = "unit";
    pub const CONTEXT: &str = "context";
    pub const NAME: &str = "name";
    pub const STRESSOR: &str = "stressor";
    pub const EXTENSION: &str = "extension";
}

// ── Factor-trade association columns ────────────────────────────────────────
pub mod association {
    pub const TRADE_ID: &str = "trade_id";
    pub const FACTOR_ID: &str = "factor_id";
    pub const COEFFICIENT: &str = "coefficient";
    pub const IMPACT_VALUE: &str = "impact_value";

    pub const ALL: [&str; 4] = [TRADE_ID, FACTOR_ID, COEFFICIENT, IMPACT_VALUE];
}

// ── Long-form matrix columns ────────────────────────────────────────────────
pub mod matrix {
    pub const FROM_REGION: &str = "from_region";
    pub const FROM_SECTOR: &str = "from_sector";
    pub const TO_REGION: &str = "to_region";
    pub const TO_SECTOR: &str = "to_sector";
    pub const FLOW: &str = "flow";

    pub const STRESSOR: &str = "stressor";
    pub const REGION: &str = "region";
    pub const SECTOR: &str = "sector";
    pub const COEFFICIENT: &str = "coefficient";
    pub const UNIT: &str = "unit";
}

// ── Impact summary columns ──────────────────────────────────────────────────
pub mod impact {
    pub const TOTAL_IMPACT_VALUE: &str = "total_impact_value";
    pub const FACTOR_COUNT: &str = "factor_count";
    pub const UNIQUE_FACTORS: &str = "unique_factors";
    pub const IMPACT_INTENSITY: &str = "impact_intensity";
}

// ── Extension names, in catalog enumeration order ───────────────────────────
pub mod extension {
    pub const AIR_EMISSIONS: &str = "air_emissions";
    pub const EMPLOYMENT: &str = "employment";
    pub const ENERGY: &str = "energy";
    pub const LAND: &str = "land";
    pub const MATERIAL: &str = "material";
    pub const WATER: &str = "water";

    pub const ALL: [&str; 6] = [
        AIR_EMISSIONS,
        EMPLOYMENT,
        ENERGY,
        LAND,
        MATERIAL,
        WATER,
    ];
}

// ── Context classification tags ─────────────────────────────────────────────
pub mod context {
    pub const EMISSION_AIR: &str = "emission/air";
    pub const EMISSION_WATER: &str = "emission/water";
    pub const ECONOMIC_EMPLOYMENT: &str = "economic/employment";
    pub const NATURAL_RESOURCE_ENERGY: &str = "natural_resource/energy";
    pub const NATURAL_RESOURCE_LAND: &str = "natural_resource/land";
    pub const NATURAL_RESOURCE_IN_GROUND: &str = "natural_resource/in_ground";
    pub const NATURAL_RESOURCE_WATER: &str = "natural_resource/water";
}
