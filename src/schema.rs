/// Column-name and category-value constants for co2-containkit.
/// Single source of truth for every table read by the pipeline.

// ── Containment table columns ───────────────────────────────────────────────
pub mod containment {
    pub const DATE: &str = "date";
    pub const AMOUNT: &str = "amount";
    pub const PHASE: &str = "phase";
    pub const CONTAINMENT: &str = "containment";
    pub const ZONE: &str = "zone";
    pub const REGION: &str = "region";

    pub const REQUIRED: [&str; 6] = [DATE, AMOUNT, PHASE, CONTAINMENT, ZONE, REGION];

    /// Sentinel zone/region value for the unfiltered ensemble aggregate row.
    pub const ALL: &str = "all";
}

// ── Phase values ────────────────────────────────────────────────────────────
pub mod phase {
    pub const TOTAL: &str = "total";
    /// Older containment schema lumps all non-trapped gas into "gas".
    pub const GAS: &str = "gas";
    pub const FREE_GAS: &str = "free_gas";
    pub const TRAPPED_GAS: &str = "trapped_gas";
    pub const AQUEOUS: &str = "aqueous";
}

// ── Containment status values ───────────────────────────────────────────────
pub mod status {
    pub const CONTAINED: &str = "contained";
    pub const OUTSIDE: &str = "outside";
    pub const HAZARDOUS: &str = "hazardous";
}

// ── Summary table ───────────────────────────────────────────────────────────
pub mod summary {
    /// Derived column; never stored in the source table.
    pub const TOTAL: &str = "TOTAL";
}

// ── Provider output ─────────────────────────────────────────────────────────
pub mod provider {
    /// Realization-id column appended to every `get_column_data` result.
    pub const REALIZATION: &str = "realization";
}

// ── Polygon file columns, in detection priority order ───────────────────────
pub mod polygon {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const X_UTME: &str = "X_UTME";
    pub const Y_UTMN: &str = "Y_UTMN";
    pub const POLY_ID: &str = "POLY_ID";
}
