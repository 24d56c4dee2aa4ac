use polars::prelude::*;

use crate::convention::{resolve_convention, ColumnConvention};
use crate::error::CckError;
use crate::provider::TableProvider;
use crate::scale::{apply_scale, Co2Scale};
use crate::schema::summary;

/// Access to the reservoir-simulation summary table. The column convention
/// (PFLOTRAN or Eclipse) is resolved once at construction.
pub struct UnsmryDataProvider {
    provider: Box<dyn TableProvider>,
    convention: &'static ColumnConvention,
}

impl UnsmryDataProvider {
    pub fn new(provider: Box<dyn TableProvider>) -> Result<Self, CckError> {
        let convention = resolve_convention(provider.column_names(), "summary table")?;
        Ok(Self {
            provider,
            convention,
        })
    }

    pub fn convention(&self) -> &'static ColumnConvention {
        self.convention
    }

    pub fn realizations(&self) -> &[i32] {
        self.provider.realizations()
    }

    pub fn colname_date(&self) -> &'static str {
        self.convention.date
    }

    pub fn colname_dissolved(&self) -> &'static str {
        self.convention.dissolved
    }

    pub fn colname_trapped(&self) -> &'static str {
        self.convention.trapped
    }

    pub fn colname_mobile(&self) -> &'static str {
        self.convention.mobile
    }

    pub fn colname_total(&self) -> &'static str {
        summary::TOTAL
    }

    /// All realizations' dissolved/trapped/mobile amounts plus the derived
    /// total, scaled. The total is always derived, never read from the
    /// table; the normalization denominator is its pre-scale maximum.
    pub fn extract(&self, scale: Co2Scale) -> Result<DataFrame, CckError> {
        let c = self.convention;
        let df = self
            .provider
            .get_column_data(&[c.date, c.dissolved, c.trapped, c.mobile], None)?;
        let full = df
            .lazy()
            .with_columns([
                col(c.dissolved).cast(DataType::Float64),
                col(c.trapped).cast(DataType::Float64),
                col(c.mobile).cast(DataType::Float64),
            ])
            .with_columns([(col(c.dissolved) + col(c.trapped) + col(c.mobile))
                .alias(summary::TOTAL)])
            .collect()?;
        apply_scale(
            &full,
            scale,
            &[c.dissolved, c.trapped, c.mobile, summary::TOTAL],
            summary::TOTAL,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryTableProvider;
    use polars::df;

    fn pflotran_frame(scale: f64) -> DataFrame {
        df!(
            "DATE" => ["2020-01-01", "2030-01-01"],
            "FGMDS" => [1.0e9 * scale, 2.0e9 * scale],
            "FGMTR" => [0.5e9 * scale, 1.0e9 * scale],
            "FGMGP" => [0.5e9 * scale, 1.0e9 * scale],
        )
        .unwrap()
    }

    fn provider_of(frames: Vec<(i32, DataFrame)>) -> UnsmryDataProvider {
        let table = InMemoryTableProvider::new("summary table", frames).unwrap();
        UnsmryDataProvider::new(Box::new(table)).unwrap()
    }

    fn column(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn total_is_derived_from_the_three_phases() {
        let provider = provider_of(vec![(0, pflotran_frame(1.0))]);
        assert_eq!(provider.convention().name, "PFLOTRAN");
        let df = provider.extract(Co2Scale::Kg).unwrap();
        assert_eq!(column(&df, "TOTAL"), vec![2.0e9, 4.0e9]);
    }

    #[test]
    fn mega_scale_applies_to_all_four_columns() {
        let provider = provider_of(vec![(0, pflotran_frame(1.0))]);
        let df = provider.extract(Co2Scale::MTons).unwrap();
        assert_eq!(column(&df, "FGMDS"), vec![1.0, 2.0]);
        assert_eq!(column(&df, "TOTAL"), vec![2.0, 4.0]);
    }

    #[test]
    fn normalization_uses_ensemble_wide_total_max() {
        let provider = provider_of(vec![
            (0, pflotran_frame(1.0)),
            (1, pflotran_frame(2.0)),
        ]);
        let df = provider.extract(Co2Scale::Normalize).unwrap();
        let totals = column(&df, "TOTAL");
        // Max derived total is realization 1's 8e9.
        assert_eq!(totals, vec![0.25, 0.5, 0.5, 1.0]);
    }
}
