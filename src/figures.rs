use std::collections::HashMap;

use polars::prelude::*;
use serde::Serialize;

use crate::comparison::{date_ord, sort_points, LineStyle, PlotDataset, PlotSeries};
use crate::containment::ContainmentDataProvider;
use crate::error::CckError;
use crate::scale::Co2Scale;
use crate::schema::{containment, phase, status};

/// One bar-segment of the end-state containment chart: the amount of one
/// (containment status, phase) combination for one realization at the last
/// simulated date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalVolumeRecord {
    pub realization: String,
    pub amount: f64,
    pub containment: String,
    pub phase: String,
}

/// Zone/region selection for the containment figures. Selecting a zone
/// pins the region to "all" and vice versa; the table has no rows with
/// both dimensions filtered.
fn resolve_selection(zone: Option<&str>, region: Option<&str>) -> (String, String) {
    match (zone, region) {
        (Some(z), _) if z != containment::ALL => (z.to_string(), containment::ALL.to_string()),
        (_, Some(r)) if r != containment::ALL => (containment::ALL.to_string(), r.to_string()),
        _ => (
            containment::ALL.to_string(),
            containment::ALL.to_string(),
        ),
    }
}

struct RealizationRows {
    dates: Vec<String>,
    amounts: Vec<f64>,
    phases: Vec<String>,
    statuses: Vec<String>,
}

fn read_selected_rows(
    provider: &ContainmentDataProvider,
    realization: i32,
    scale: Co2Scale,
    zone: Option<&str>,
    region: Option<&str>,
) -> Result<RealizationRows, CckError> {
    let (zone, region) = resolve_selection(zone, region);
    let df = provider.extract(realization, scale)?;
    let df = df
        .lazy()
        .filter(
            col(containment::ZONE)
                .eq(lit(zone))
                .and(col(containment::REGION).eq(lit(region))),
        )
        .collect()?;
    let amounts = df
        .column(containment::AMOUNT)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(RealizationRows {
        dates: df
            .column(containment::DATE)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect(),
        amounts: amounts.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        phases: df
            .column(containment::PHASE)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect(),
        statuses: df
            .column(containment::CONTAINMENT)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect(),
    })
}

fn mobile_phase_of(rows: &RealizationRows) -> &'static str {
    if rows.phases.iter().any(|p| p == phase::FREE_GAS) {
        phase::FREE_GAS
    } else {
        phase::GAS
    }
}

fn require_realizations(realizations: &[i32]) -> Result<(), CckError> {
    if realizations.is_empty() {
        return Err(CckError::InvalidSelection(
            "no realizations selected".to_string(),
        ));
    }
    Ok(())
}

/// End-state containment per realization, broken down by containment
/// status and phase. Realizations are ordered by their mobile-gas amount
/// outside the boundary, ascending.
pub fn terminal_containment_data(
    provider: &ContainmentDataProvider,
    realizations: &[i32],
    scale: Co2Scale,
    zone: Option<&str>,
    region: Option<&str>,
) -> Result<Vec<TerminalVolumeRecord>, CckError> {
    require_realizations(realizations)?;
    let mut per_real: Vec<(f64, Vec<TerminalVolumeRecord>)> = Vec::new();
    for real in realizations {
        let rows = read_selected_rows(provider, *real, scale, zone, region)?;
        let Some(last_date) = rows
            .dates
            .iter()
            .max_by(|a, b| date_ord(a.as_str(), b.as_str()))
            .cloned()
        else {
            continue;
        };
        let mobile_phase = mobile_phase_of(&rows);
        let mut records = Vec::new();
        let mut sort_key = 0.0;
        for i in 0..rows.dates.len() {
            if rows.dates[i] != last_date || rows.phases[i] == phase::TOTAL {
                continue;
            }
            if rows.phases[i] == mobile_phase && rows.statuses[i] == status::OUTSIDE {
                sort_key = rows.amounts[i];
            }
            records.push(TerminalVolumeRecord {
                realization: real.to_string(),
                amount: rows.amounts[i],
                containment: rows.statuses[i].clone(),
                phase: rows.phases[i].clone(),
            });
        }
        per_real.push((sort_key, records));
    }
    per_real.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(per_real.into_iter().flat_map(|(_, r)| r).collect())
}

/// Total / outside / hazardous CO2 over time, one line set per
/// realization, legend merged by line group.
pub fn time_containment_data(
    provider: &ContainmentDataProvider,
    realizations: &[i32],
    scale: Co2Scale,
    zone: Option<&str>,
    region: Option<&str>,
) -> Result<PlotDataset, CckError> {
    require_realizations(realizations)?;
    let mut dataset = PlotDataset::default();
    for real in realizations {
        let rows = read_selected_rows(provider, *real, scale, zone, region)?;
        let mut total: HashMap<String, f64> = HashMap::new();
        let mut outside: HashMap<String, f64> = HashMap::new();
        let mut hazardous: HashMap<String, f64> = HashMap::new();
        for i in 0..rows.dates.len() {
            if rows.phases[i] != phase::TOTAL {
                continue;
            }
            let date = rows.dates[i].clone();
            *total.entry(date.clone()).or_insert(0.0) += rows.amounts[i];
            if rows.statuses[i] == status::OUTSIDE {
                *outside.entry(date.clone()).or_insert(0.0) += rows.amounts[i];
            }
            if rows.statuses[i] == status::HAZARDOUS {
                *hazardous.entry(date).or_insert(0.0) += rows.amounts[i];
            }
        }
        for (group, style, by_date) in [
            ("Total", LineStyle::Solid, total),
            ("Outside", LineStyle::Dotted, outside),
            ("Hazardous", LineStyle::Dashed, hazardous),
        ] {
            if by_date.is_empty() {
                continue;
            }
            let mut points: Vec<(String, f64)> = by_date.into_iter().collect();
            sort_points(&mut points);
            dataset.series.push(PlotSeries {
                x: points.iter().map(|(d, _)| d.clone()).collect(),
                y: points.iter().map(|(_, v)| *v).collect(),
                label: group.to_string(),
                group: group.to_string(),
                style,
                color_key: real.to_string(),
            });
        }
    }
    Ok(dataset)
}

/// Mobile gas outside the boundary over time, one line per realization.
pub fn time_mobile_outside_data(
    provider: &ContainmentDataProvider,
    realizations: &[i32],
    scale: Co2Scale,
    zone: Option<&str>,
    region: Option<&str>,
) -> Result<PlotDataset, CckError> {
    require_realizations(realizations)?;
    let mut dataset = PlotDataset::default();
    for real in realizations {
        let rows = read_selected_rows(provider, *real, scale, zone, region)?;
        let mobile_phase = mobile_phase_of(&rows);
        let mut points: Vec<(String, f64)> = Vec::new();
        for i in 0..rows.dates.len() {
            if rows.phases[i] == mobile_phase && rows.statuses[i] == status::OUTSIDE {
                points.push((rows.dates[i].clone(), rows.amounts[i]));
            }
        }
        if points.is_empty() {
            continue;
        }
        sort_points(&mut points);
        dataset.series.push(PlotSeries {
            x: points.iter().map(|(d, _)| d.clone()).collect(),
            y: points.iter().map(|(_, v)| *v).collect(),
            label: "Mobile gas outside boundary".to_string(),
            group: "Mobile outside".to_string(),
            style: LineStyle::Solid,
            color_key: real.to_string(),
        });
    }
    Ok(dataset)
}
