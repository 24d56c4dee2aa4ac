use std::collections::HashMap;
use std::sync::RwLock;

use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::CckError;
use crate::provider::TableProvider;
use crate::scale::{column_max, Co2Scale, MEGA_SCALE_FACTOR};
use crate::schema::{containment, phase};

/// Filter choices the containment table supports, derived from the data.
/// Empty `zones`/`regions` means the table has no such breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuOptions {
    pub zones: Vec<String>,
    pub regions: Vec<String>,
    pub phases: Vec<String>,
}

/// Access to the per-realization CO2 containment table: amounts by date,
/// phase, containment status, zone and region.
///
/// The normalization scale factor is memoized per instance; tables are
/// treated as immutable once constructed, so the cache is never invalidated.
pub struct ContainmentDataProvider {
    provider: Box<dyn TableProvider>,
    scale_factors: RwLock<HashMap<Co2Scale, f64>>,
}

impl std::fmt::Debug for ContainmentDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainmentDataProvider")
            .field("realizations", &self.provider.realizations())
            .field("scale_factors", &self.scale_factors)
            .finish()
    }
}

impl ContainmentDataProvider {
    pub fn new(provider: Box<dyn TableProvider>) -> Result<Self, CckError> {
        let available = provider.column_names();
        let missing: Vec<&str> = containment::REQUIRED
            .iter()
            .filter(|c| !available.iter().any(|a| a == *c))
            .copied()
            .collect();
        if !missing.is_empty() {
            let first = provider.realizations().first().copied().unwrap_or(0);
            return Err(CckError::missing_columns(
                &format!("containment table, realization {first} (and possibly others)"),
                &missing,
                available,
            ));
        }
        Ok(Self {
            provider,
            scale_factors: RwLock::new(HashMap::new()),
        })
    }

    pub fn realizations(&self) -> &[i32] {
        self.provider.realizations()
    }

    /// Enumerate the zone/region/phase choices present in the data,
    /// inspecting the first realization only.
    pub fn menu_options(&self) -> Result<MenuOptions, CckError> {
        let first = self.provider.realizations()[0];
        let df = self.provider.get_column_data(
            &[containment::ZONE, containment::REGION, containment::PHASE],
            Some(&[first]),
        )?;
        let zones = distinct_after_all(df.column(containment::ZONE)?)?;
        let regions = distinct_after_all(df.column(containment::REGION)?)?;

        let mut has_free_gas = false;
        for value in df.column(containment::PHASE)?.str()?.into_iter().flatten() {
            if value == phase::FREE_GAS {
                has_free_gas = true;
                break;
            }
        }
        let phases = if has_free_gas {
            vec![phase::TOTAL, phase::FREE_GAS, phase::TRAPPED_GAS, phase::AQUEOUS]
        } else {
            vec![phase::TOTAL, phase::GAS, phase::AQUEOUS]
        };

        Ok(MenuOptions {
            zones,
            regions,
            phases: phases.into_iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Full rows of one realization with the amount column scaled.
    pub fn extract(&self, realization: i32, scale: Co2Scale) -> Result<DataFrame, CckError> {
        let columns: Vec<&str> = self
            .provider
            .column_names()
            .iter()
            .map(|c| c.as_str())
            .collect();
        let df = self
            .provider
            .get_column_data(&columns, Some(&[realization]))?;
        self.divide_amount(df, scale)
    }

    /// The whole-ensemble aggregate rows (zone == "all" AND region == "all")
    /// across all realizations, amount scaled.
    pub fn extract_condensed(&self, scale: Co2Scale) -> Result<DataFrame, CckError> {
        let columns: Vec<&str> = self
            .provider
            .column_names()
            .iter()
            .map(|c| c.as_str())
            .collect();
        let df = self.provider.get_column_data(&columns, None)?;
        let condensed = df
            .lazy()
            .filter(
                col(containment::ZONE)
                    .eq(lit(containment::ALL))
                    .and(col(containment::REGION).eq(lit(containment::ALL))),
            )
            .collect()?;
        self.divide_amount(condensed, scale)
    }

    fn divide_amount(&self, df: DataFrame, scale: Co2Scale) -> Result<DataFrame, CckError> {
        let factor = self.scale_factor(scale)?;
        if factor == 1.0 {
            return Ok(df);
        }
        let scaled = df
            .lazy()
            .with_columns([col(containment::AMOUNT).cast(DataType::Float64) / lit(factor)])
            .collect()?;
        Ok(scaled)
    }

    fn scale_factor(&self, scale: Co2Scale) -> Result<f64, CckError> {
        {
            let cache = self
                .scale_factors
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(factor) = cache.get(&scale) {
                return Ok(*factor);
            }
        }
        let factor = match scale {
            Co2Scale::Kg => 1.0,
            Co2Scale::MTons => MEGA_SCALE_FACTOR,
            Co2Scale::Normalize => self.max_ensemble_total()?,
        };
        let mut cache = self
            .scale_factors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(scale, factor);
        Ok(factor)
    }

    /// Normalization denominator: the maximum unscaled amount over the
    /// derived ensemble total (phase == "total" at zone/region == "all"),
    /// across all realizations and dates.
    fn max_ensemble_total(&self) -> Result<f64, CckError> {
        let df = self.provider.get_column_data(
            &[
                containment::AMOUNT,
                containment::PHASE,
                containment::ZONE,
                containment::REGION,
            ],
            None,
        )?;
        let totals = df
            .lazy()
            .filter(
                col(containment::PHASE)
                    .eq(lit(phase::TOTAL))
                    .and(col(containment::ZONE).eq(lit(containment::ALL)))
                    .and(col(containment::REGION).eq(lit(containment::ALL))),
            )
            .collect()?;
        match column_max(&totals, containment::AMOUNT)? {
            Some(max) if max > 0.0 => Ok(max),
            _ => {
                warn!("ensemble total is zero or absent, normalization degrades to raw values");
                Ok(1.0)
            }
        }
    }
}

/// `["all"] + distinct values in first-seen order`, or empty when the
/// column holds a single distinct value (no filtering available).
fn distinct_after_all(column: &Column) -> Result<Vec<String>, CckError> {
    let mut values = vec![containment::ALL.to_string()];
    for value in column.str()?.into_iter().flatten() {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    if values.len() > 1 {
        Ok(values)
    } else {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryTableProvider;
    use polars::df;

    fn single_zone_frame(peak_amount: f64) -> DataFrame {
        df!(
            "date" => ["2020-01-01", "2020-01-01", "2030-01-01", "2030-01-01"],
            "amount" => [peak_amount / 2.0, peak_amount / 4.0, peak_amount, peak_amount / 2.0],
            "phase" => ["total", "gas", "total", "gas"],
            "containment" => ["contained", "contained", "contained", "contained"],
            "zone" => ["all", "all", "all", "all"],
            "region" => ["all", "all", "all", "all"],
        )
        .unwrap()
    }

    fn zoned_frame() -> DataFrame {
        df!(
            "date" => ["2030-01-01", "2030-01-01", "2030-01-01", "2030-01-01"],
            "amount" => [8.0, 3.0, 5.0, 2.0],
            "phase" => ["total", "total", "total", "free_gas"],
            "containment" => ["contained", "contained", "contained", "contained"],
            "zone" => ["all", "upper", "lower", "all"],
            "region" => ["all", "all", "all", "all"],
        )
        .unwrap()
    }

    fn provider_of(frames: Vec<(i32, DataFrame)>) -> ContainmentDataProvider {
        let table = InMemoryTableProvider::new("containment table", frames).unwrap();
        ContainmentDataProvider::new(Box::new(table)).unwrap()
    }

    fn amounts(df: &DataFrame) -> Vec<f64> {
        df.column("amount")
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn missing_columns_fail_construction_with_names() {
        let bad = df!("date" => ["2020-01-01"], "amount" => [1.0]).unwrap();
        let table = InMemoryTableProvider::new("containment table", vec![(0, bad)]).unwrap();
        let err = ContainmentDataProvider::new(Box::new(table)).unwrap_err();
        match err {
            CckError::SchemaMismatch { missing, .. } => {
                assert!(missing.contains(&"phase".to_string()));
                assert!(missing.contains(&"zone".to_string()));
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn menu_options_hide_single_zone_tables() {
        let provider = provider_of(vec![(0, single_zone_frame(1.0))]);
        let options = provider.menu_options().unwrap();
        assert!(options.zones.is_empty());
        assert!(options.regions.is_empty());
        assert_eq!(options.phases, vec!["total", "gas", "aqueous"]);
    }

    #[test]
    fn menu_options_list_all_plus_distinct_zones() {
        let provider = provider_of(vec![(0, zoned_frame())]);
        let options = provider.menu_options().unwrap();
        assert_eq!(options.zones, vec!["all", "upper", "lower"]);
        assert!(options.regions.is_empty());
        assert_eq!(
            options.phases,
            vec!["total", "free_gas", "trapped_gas", "aqueous"]
        );
    }

    #[test]
    fn condensed_extract_scales_to_mega_tonnes() {
        let provider = provider_of(vec![(0, single_zone_frame(1.0e10))]);
        let df = provider.extract_condensed(Co2Scale::MTons).unwrap();
        let totals: Vec<f64> = amounts(&df);
        assert!((totals[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn condensed_extract_drops_zone_breakdown_rows() {
        let provider = provider_of(vec![(0, zoned_frame())]);
        let df = provider.extract_condensed(Co2Scale::Kg).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn normalization_uses_max_total_across_realizations() {
        let provider = provider_of(vec![
            (0, single_zone_frame(8.0e9)),
            (1, single_zone_frame(1.0e10)),
        ]);
        let df = provider.extract(0, Co2Scale::Normalize).unwrap();
        let scaled = amounts(&df);
        // Realization 0 peak total is 8e9; the ensemble max is 1e10.
        assert!((scaled[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn zero_total_degrades_to_unscaled_amounts() {
        let provider = provider_of(vec![(0, single_zone_frame(0.0))]);
        let df = provider.extract(0, Co2Scale::Normalize).unwrap();
        assert_eq!(amounts(&df), vec![0.0, 0.0, 0.0, 0.0]);
    }
}
