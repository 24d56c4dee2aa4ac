use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::containment::ContainmentDataProvider;
use crate::error::CckError;
use crate::scale::Co2Scale;
use crate::schema::{containment, phase, provider};
use crate::summary::UnsmryDataProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// One plottable line. `group` merges legend entries across realizations
/// and across the two data sources; `color_key` picks the color family.
#[derive(Debug, Clone, Serialize)]
pub struct PlotSeries {
    pub x: Vec<String>,
    pub y: Vec<f64>,
    pub label: String,
    pub group: String,
    pub style: LineStyle,
    pub color_key: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlotDataset {
    pub series: Vec<PlotSeries>,
}

const GROUP_TOTAL: &str = "Total";
const GROUP_MOBILE: &str = "Mobile";
const GROUP_DISSOLVED: &str = "Dissolved";
const GROUP_TRAPPED: &str = "Trapped";

/// Percentage discrepancy between the two sources at the last time step,
/// rounded to two decimals. A zero summary value has no meaningful
/// percentage; that is a `NumericDegenerate` error, never infinity.
pub fn last_step_percent_error(
    containment_value: f64,
    summary_value: f64,
) -> Result<f64, CckError> {
    if summary_value == 0.0 {
        return Err(CckError::NumericDegenerate(
            "summary value at last time step is zero, percentage error undefined".to_string(),
        ));
    }
    let pct = 100.0 * (containment_value - summary_value).abs() / summary_value;
    Ok((pct * 100.0).round() / 100.0)
}

/// Chronological ordering of date strings. ISO dates (with or without a
/// time part) compare as calendar dates; anything else falls back to
/// lexicographic order.
pub(crate) fn date_ord(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (
        NaiveDate::parse_from_str(a, "%Y-%m-%d"),
        NaiveDate::parse_from_str(b, "%Y-%m-%d"),
    ) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (
        NaiveDateTime::parse_from_str(a, "%Y-%m-%d %H:%M:%S"),
        NaiveDateTime::parse_from_str(b, "%Y-%m-%d %H:%M:%S"),
    ) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

pub(crate) fn sort_points(points: &mut Vec<(String, f64)>) {
    points.sort_by(|a, b| date_ord(&a.0, &b.0));
}

fn last_value(points: &[(String, f64)]) -> Option<f64> {
    points.last().map(|(_, v)| *v)
}

/// Join the containment aggregate against the independent summary table
/// into one combined plot dataset: solid lines per realization per summary
/// series, dashed lines per realization per containment phase, matched
/// series merged by legend group, and the last-time-step percentage
/// discrepancy (computed on the lowest realization present in both
/// sources) embedded in the legend labels of the matched groups.
pub fn build_comparison(
    unsmry: &UnsmryDataProvider,
    containment: &ContainmentDataProvider,
    scale: Co2Scale,
) -> Result<PlotDataset, CckError> {
    let s_df = unsmry.extract(scale)?;
    let c_df = containment.extract_condensed(scale)?;

    let reference = unsmry
        .realizations()
        .iter()
        .copied()
        .filter(|r| containment.realizations().contains(r))
        .min()
        .ok_or_else(|| {
            CckError::InvalidSelection(
                "no realization is present in both the summary and containment tables".to_string(),
            )
        })?;

    // Summary side: per-realization (date, value) points for each column.
    let s_columns = [
        (GROUP_DISSOLVED, unsmry.colname_dissolved()),
        (GROUP_TRAPPED, unsmry.colname_trapped()),
        (GROUP_MOBILE, unsmry.colname_mobile()),
        (GROUP_TOTAL, unsmry.colname_total()),
    ];
    let mut s_points: HashMap<(i32, &str), Vec<(String, f64)>> = HashMap::new();
    {
        let dates = s_df.column(unsmry.colname_date())?.str()?.clone();
        let reals = s_df.column(provider::REALIZATION)?.i32()?.clone();
        for (group, column) in s_columns {
            let values = s_df.column(column)?.f64()?.clone();
            for i in 0..s_df.height() {
                let (Some(date), Some(real), Some(value)) =
                    (dates.get(i), reals.get(i), values.get(i))
                else {
                    continue;
                };
                s_points
                    .entry((real, group))
                    .or_default()
                    .push((date.to_string(), value));
            }
        }
    }
    for points in s_points.values_mut() {
        sort_points(points);
    }

    // Containment side: per-realization per-phase points, amounts summed
    // over the containment statuses at each date.
    let uses_free_gas = {
        let phases = c_df.column(containment::PHASE)?.str()?;
        phases.into_iter().flatten().any(|p| p == phase::FREE_GAS)
    };
    let mobile_phase = if uses_free_gas { phase::FREE_GAS } else { phase::GAS };
    let mut c_phases = vec![
        (phase::TOTAL, GROUP_TOTAL),
        (mobile_phase, GROUP_MOBILE),
        (phase::AQUEOUS, GROUP_DISSOLVED),
    ];
    if uses_free_gas {
        c_phases.push((phase::TRAPPED_GAS, GROUP_TRAPPED));
    }

    let mut c_sums: HashMap<(i32, &str), HashMap<String, f64>> = HashMap::new();
    {
        let dates = c_df.column(containment::DATE)?.str()?.clone();
        let phases = c_df.column(containment::PHASE)?.str()?.clone();
        let reals = c_df.column(provider::REALIZATION)?.i32()?.clone();
        let amounts = c_df
            .column(containment::AMOUNT)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let amounts = amounts.f64()?;
        for i in 0..c_df.height() {
            let (Some(date), Some(row_phase), Some(real), Some(amount)) =
                (dates.get(i), phases.get(i), reals.get(i), amounts.get(i))
            else {
                continue;
            };
            let Some(&(_, group)) = c_phases.iter().find(|(p, _)| *p == row_phase) else {
                continue;
            };
            *c_sums
                .entry((real, group))
                .or_default()
                .entry(date.to_string())
                .or_insert(0.0) += amount;
        }
    }
    let mut c_points: HashMap<(i32, &str), Vec<(String, f64)>> = HashMap::new();
    for ((real, group), by_date) in c_sums {
        let mut points: Vec<(String, f64)> = by_date.into_iter().collect();
        sort_points(&mut points);
        c_points.insert((real, group), points);
    }

    // Last-time-step discrepancy on the reference realization, per matched
    // group. A degenerate (zero) summary value drops the annotation but not
    // the figure.
    let mut errors: HashMap<&str, f64> = HashMap::new();
    for group in [GROUP_TOTAL, GROUP_MOBILE, GROUP_DISSOLVED] {
        let summary_last = s_points
            .get(&(reference, group))
            .and_then(|p| last_value(p));
        let containment_last = c_points
            .get(&(reference, group))
            .and_then(|p| last_value(p));
        let (Some(summary_last), Some(containment_last)) = (summary_last, containment_last)
        else {
            continue;
        };
        match last_step_percent_error(containment_last, summary_last) {
            Ok(pct) => {
                errors.insert(group, pct);
            }
            Err(CckError::NumericDegenerate(reason)) => {
                warn!(group, reason = %reason, "omitting discrepancy annotation");
            }
            Err(other) => return Err(other),
        }
    }
    let group_label = |group: &str| -> String {
        match errors.get(group) {
            Some(pct) => format!("{group} (diff: {pct:.2}%)"),
            None => group.to_string(),
        }
    };

    let mut dataset = PlotDataset::default();
    for real in unsmry.realizations() {
        for (group, column) in s_columns {
            let Some(points) = s_points.get(&(*real, group)) else {
                continue;
            };
            let label = if group == GROUP_TOTAL {
                group_label(group)
            } else {
                format!("{} ({column})", group_label(group))
            };
            dataset.series.push(PlotSeries {
                x: points.iter().map(|(d, _)| d.clone()).collect(),
                y: points.iter().map(|(_, v)| *v).collect(),
                label,
                group: group.to_string(),
                style: LineStyle::Solid,
                color_key: group.to_lowercase(),
            });
        }
    }
    for real in containment.realizations() {
        for (row_phase, group) in &c_phases {
            let Some(points) = c_points.get(&(*real, *group)) else {
                continue;
            };
            dataset.series.push(PlotSeries {
                x: points.iter().map(|(d, _)| d.clone()).collect(),
                y: points.iter().map(|(_, v)| *v).collect(),
                label: format!("{} [{row_phase}, containment]", group_label(group)),
                group: group.to_string(),
                style: LineStyle::Dashed,
                color_key: group.to_lowercase(),
            });
        }
    }
    Ok(dataset)
}
