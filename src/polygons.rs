use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::CckError;
use crate::schema::polygon;

/// GeoJSON geometry for a boundary layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            kind: "Feature",
            properties: serde_json::Map::new(),
            geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn single(geometry: Geometry) -> Self {
        Self {
            kind: "FeatureCollection",
            features: vec![Feature::new(geometry)],
        }
    }
}

/// Boundary polygons for an ensemble: either one absolute file shared by
/// every realization, or a per-realization file resolved against each
/// realization's root directory. A missing file maps that realization to
/// "no geometry" instead of failing.
pub struct EnsemblePolygonProvider {
    source: Source,
}

enum Source {
    Absolute(Option<FeatureCollection>),
    PerRealization(HashMap<i32, Option<FeatureCollection>>),
}

impl EnsemblePolygonProvider {
    pub fn new(
        poly_path: &Path,
        realization_roots: &BTreeMap<i32, PathBuf>,
    ) -> Result<Self, CckError> {
        let source = if poly_path.is_absolute() {
            Source::Absolute(try_parse_polygon_file(poly_path)?)
        } else {
            let mut per_real = HashMap::new();
            for (real, root) in realization_roots {
                per_real.insert(*real, try_parse_polygon_file(&root.join(poly_path))?);
            }
            Source::PerRealization(per_real)
        };
        Ok(Self { source })
    }

    pub fn geometry_for(&self, realization: i32) -> Option<&FeatureCollection> {
        match &self.source {
            Source::Absolute(geometry) => geometry.as_ref(),
            Source::PerRealization(map) => map.get(&realization).and_then(|g| g.as_ref()),
        }
    }
}

fn try_parse_polygon_file(path: &Path) -> Result<Option<FeatureCollection>, CckError> {
    if !path.is_file() {
        warn!(path = %path.display(), "polygon file absent, layer degrades to no geometry");
        return Ok(None);
    }
    parse_polygon_file(path).map(Some)
}

/// Parse a polygon CSV into a feature collection. Coordinate columns are
/// detected by a fixed priority: lowercase `x`/`y`, then UTM columns with
/// optional `POLY_ID` ring grouping, then the first two columns.
pub fn parse_polygon_file(path: &Path) -> Result<FeatureCollection, CckError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    let columns: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let has = |name: &str| columns.iter().any(|c| c == name);

    let geometry = if has(polygon::X) && has(polygon::Y) {
        Geometry::Polygon {
            coordinates: vec![ring_of(&df, polygon::X, polygon::Y)?],
        }
    } else if has(polygon::X_UTME) && has(polygon::Y_UTMN) {
        if has(polygon::POLY_ID) {
            let mut rings = Vec::new();
            for group in df.partition_by_stable([polygon::POLY_ID], true)? {
                rings.push(vec![ring_of(&group, polygon::X_UTME, polygon::Y_UTMN)?]);
            }
            Geometry::MultiPolygon { coordinates: rings }
        } else {
            Geometry::Polygon {
                coordinates: vec![ring_of(&df, polygon::X_UTME, polygon::Y_UTMN)?],
            }
        }
    } else {
        // Attempt to use the first two columns as the x and y coordinates.
        if columns.len() < 2 {
            return Err(CckError::missing_columns(
                &path.display().to_string(),
                &[polygon::X, polygon::Y],
                &columns,
            ));
        }
        Geometry::Polygon {
            coordinates: vec![ring_of(&df, &columns[0], &columns[1])?],
        }
    };
    Ok(FeatureCollection::single(geometry))
}

fn ring_of(df: &DataFrame, x_column: &str, y_column: &str) -> Result<Vec<[f64; 2]>, CckError> {
    let x = df
        .column(x_column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let y = df
        .column(y_column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let mut ring = Vec::with_capacity(df.height());
    for (x, y) in x.f64()?.into_iter().zip(y.f64()?) {
        if let (Some(x), Some(y)) = (x, y) {
            ring.push([x, y]);
        }
    }
    Ok(ring)
}
