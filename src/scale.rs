use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::CckError;

/// Unit scale applied to CO2 amount columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Co2Scale {
    /// Raw unit as stored (kg for mass tables).
    Kg,
    /// Mega-tonnes: stored amount divided by 1e9.
    MTons,
    /// Fraction of the maximum total over the entire dataset.
    Normalize,
}

pub const MEGA_SCALE_FACTOR: f64 = 1e9;

impl Co2Scale {
    /// Axis/legend unit text.
    pub fn unit_label(&self) -> &'static str {
        match self {
            Co2Scale::Kg => "Kg",
            Co2Scale::MTons => "M tons",
            Co2Scale::Normalize => "Fraction",
        }
    }
}

/// Apply `scale` to the given amount columns, returning a derived frame.
/// The input frame is never mutated.
///
/// `Normalize` divides by the maximum of `total_column` over the whole
/// frame, so it must only ever be applied to unscaled data; chaining scale
/// applications is unsupported. A zero (or absent) maximum leaves the values
/// unchanged rather than producing NaN/Inf.
pub fn apply_scale(
    df: &DataFrame,
    scale: Co2Scale,
    amount_columns: &[&str],
    total_column: &str,
) -> Result<DataFrame, CckError> {
    let divisor = match scale {
        Co2Scale::Kg => return Ok(df.clone()),
        Co2Scale::MTons => MEGA_SCALE_FACTOR,
        Co2Scale::Normalize => {
            let max = column_max(df, total_column)?;
            match max {
                Some(max) if max > 0.0 => max,
                _ => {
                    warn!(
                        total_column,
                        "normalization denominator is zero or undefined, leaving values unscaled"
                    );
                    return Ok(df.clone());
                }
            }
        }
    };
    let exprs: Vec<Expr> = amount_columns
        .iter()
        .map(|c| col(*c).cast(DataType::Float64) / lit(divisor))
        .collect();
    let scaled = df.clone().lazy().with_columns(exprs).collect()?;
    Ok(scaled)
}

/// Maximum of a numeric column as f64, `None` for an empty/all-null column.
pub fn column_max(df: &DataFrame, column: &str) -> Result<Option<f64>, CckError> {
    let series = df
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let max = series.max_reduce()?;
    Ok(max.value().try_extract::<f64>().ok().filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn frame() -> DataFrame {
        df!(
            "date" => ["2020-01-01", "2025-01-01", "2030-01-01"],
            "amount" => [1.0e9, 2.0e9, 4.0e9],
            "total" => [2.0e9, 4.0e9, 8.0e9],
        )
        .unwrap()
    }

    fn amounts(df: &DataFrame, column: &str) -> Vec<f64> {
        df.column(column)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn kg_scale_is_identity() {
        let df = frame();
        let scaled = apply_scale(&df, Co2Scale::Kg, &["amount", "total"], "total").unwrap();
        assert_eq!(amounts(&scaled, "amount"), amounts(&df, "amount"));
    }

    #[test]
    fn mega_scale_divides_by_1e9() {
        let df = frame();
        let scaled = apply_scale(&df, Co2Scale::MTons, &["amount", "total"], "total").unwrap();
        let raw = amounts(&df, "total");
        let mega = amounts(&scaled, "total");
        for (r, m) in raw.iter().zip(&mega) {
            assert!((r / 1e9 - m).abs() < 1e-9);
        }
        // Source frame untouched
        assert_eq!(amounts(&df, "total"), vec![2.0e9, 4.0e9, 8.0e9]);
    }

    #[test]
    fn normalize_divides_by_max_total_of_unscaled_data() {
        let df = frame();
        let scaled =
            apply_scale(&df, Co2Scale::Normalize, &["amount", "total"], "total").unwrap();
        assert_eq!(amounts(&scaled, "total"), vec![0.25, 0.5, 1.0]);
        assert_eq!(amounts(&scaled, "amount"), vec![0.125, 0.25, 0.5]);
    }

    #[test]
    fn zero_max_total_leaves_values_unchanged() {
        let df = df!(
            "amount" => [0.0, 0.0],
            "total" => [0.0, 0.0],
        )
        .unwrap();
        let scaled = apply_scale(&df, Co2Scale::Normalize, &["amount"], "total").unwrap();
        assert_eq!(amounts(&scaled, "amount"), vec![0.0, 0.0]);
    }
}
