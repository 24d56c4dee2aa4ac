use std::collections::HashMap;

use serde::Serialize;

use crate::error::CckError;

/// Visual property selectable for the map view. Plume attributes are
/// derived from a max-saturation basis attribute plus contour parameters
/// rather than a stored raw surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MapAttribute {
    MigrationTimeSgas,
    MigrationTimeAmfg,
    MaxSgas,
    MaxAmfg,
    SgasPlume,
    AmfgPlume,
    Mass,
    Dissolved,
    Free,
}

impl MapAttribute {
    pub const ALL: [MapAttribute; 9] = [
        MapAttribute::MigrationTimeSgas,
        MapAttribute::MigrationTimeAmfg,
        MapAttribute::MaxSgas,
        MapAttribute::MaxAmfg,
        MapAttribute::SgasPlume,
        MapAttribute::AmfgPlume,
        MapAttribute::Mass,
        MapAttribute::Dissolved,
        MapAttribute::Free,
    ];

    /// Configuration key, as accepted in the `map_attribute_names` mapping.
    pub fn key(&self) -> &'static str {
        match self {
            MapAttribute::MigrationTimeSgas => "MIGRATION_TIME_SGAS",
            MapAttribute::MigrationTimeAmfg => "MIGRATION_TIME_AMFG",
            MapAttribute::MaxSgas => "MAX_SGAS",
            MapAttribute::MaxAmfg => "MAX_AMFG",
            MapAttribute::SgasPlume => "SGAS_PLUME",
            MapAttribute::AmfgPlume => "AMFG_PLUME",
            MapAttribute::Mass => "MASS",
            MapAttribute::Dissolved => "DISSOLVED",
            MapAttribute::Free => "FREE",
        }
    }

    pub fn from_key(key: &str) -> Option<MapAttribute> {
        MapAttribute::ALL.into_iter().find(|a| a.key() == key)
    }

    /// UI display label.
    pub fn label(&self) -> &'static str {
        match self {
            MapAttribute::MigrationTimeSgas => "Migration time (SGAS)",
            MapAttribute::MigrationTimeAmfg => "Migration time (AMFG)",
            MapAttribute::MaxSgas => "Maximum SGAS",
            MapAttribute::MaxAmfg => "Maximum AMFG",
            MapAttribute::SgasPlume => "Plume (SGAS)",
            MapAttribute::AmfgPlume => "Plume (AMFG)",
            MapAttribute::Mass => "Mass",
            MapAttribute::Dissolved => "Dissolved mass",
            MapAttribute::Free => "Free gas mass",
        }
    }

    pub fn is_plume(&self) -> bool {
        matches!(self, MapAttribute::SgasPlume | MapAttribute::AmfgPlume)
    }

    pub fn is_migration_time(&self) -> bool {
        matches!(
            self,
            MapAttribute::MigrationTimeSgas | MapAttribute::MigrationTimeAmfg
        )
    }

    pub fn is_mass(&self) -> bool {
        matches!(
            self,
            MapAttribute::Mass | MapAttribute::Dissolved | MapAttribute::Free
        )
    }

    /// The stored attribute a plume contour is computed from.
    pub fn plume_basis(&self) -> Option<MapAttribute> {
        match self {
            MapAttribute::SgasPlume => Some(MapAttribute::MaxSgas),
            MapAttribute::AmfgPlume => Some(MapAttribute::MaxAmfg),
            _ => None,
        }
    }
}

/// Reducer applied across realizations for statistical surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurfaceStatistic {
    Mean,
    #[serde(rename = "STDDEV")]
    StdDev,
    Minimum,
    Maximum,
    P10,
    P90,
}

/// Mapping from map attribute to the raw surface-attribute name used on
/// disk. Plume attributes deliberately have no entry; they resolve through
/// their basis attribute.
#[derive(Debug, Clone)]
pub struct MapAttributeNames(HashMap<MapAttribute, String>);

impl MapAttributeNames {
    /// Name convention of xtgeoapp_grd3dmaps.
    pub fn default_names() -> Self {
        let mut names = HashMap::new();
        names.insert(
            MapAttribute::MigrationTimeSgas,
            "migrationtime_sgas".to_string(),
        );
        names.insert(
            MapAttribute::MigrationTimeAmfg,
            "migrationtime_amfg".to_string(),
        );
        names.insert(MapAttribute::MaxSgas, "max_sgas".to_string());
        names.insert(MapAttribute::MaxAmfg, "max_amfg".to_string());
        names.insert(MapAttribute::Mass, "co2-mass-total".to_string());
        names.insert(MapAttribute::Dissolved, "co2-mass-aqu-phase".to_string());
        names.insert(MapAttribute::Free, "co2-mass-gas-phase".to_string());
        Self(names)
    }

    /// Override the defaults from a configuration mapping keyed by
    /// attribute key (e.g. `MAX_SGAS`).
    pub fn from_overrides(overrides: &HashMap<String, String>) -> Result<Self, CckError> {
        let mut names = HashMap::new();
        for (key, value) in overrides {
            let attribute = MapAttribute::from_key(key).ok_or_else(|| {
                CckError::InvalidSelection(format!("Unknown map attribute key '{key}'"))
            })?;
            names.insert(attribute, value.clone());
        }
        Ok(Self(names))
    }

    pub fn get(&self, attribute: MapAttribute) -> Result<&str, CckError> {
        self.0.get(&attribute).map(|s| s.as_str()).ok_or_else(|| {
            CckError::InvalidSelection(format!(
                "No surface attribute name configured for {}",
                attribute.key()
            ))
        })
    }
}

/// The raw surface attribute behind a map attribute: plume kinds resolve
/// through their basis.
pub fn property_origin(
    attribute: MapAttribute,
    names: &MapAttributeNames,
) -> Result<String, CckError> {
    let origin = match attribute.plume_basis() {
        Some(basis) => names.get(basis)?,
        None => names.get(attribute)?,
    };
    Ok(origin.to_string())
}

/// Display name of a map attribute including its unit suffix.
pub fn readable_name(attribute: MapAttribute) -> String {
    let unit = if attribute.is_migration_time() {
        " [year]"
    } else if attribute.is_plume() {
        " [# real.]"
    } else {
        ""
    };
    format!("{}{unit}", attribute.label())
}

/// Threshold/smoothing inputs for plume contouring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContourParams {
    pub threshold: f64,
    pub smoothing: f64,
}

/// Address of one surface to fetch from the surface server. Exactly one
/// variant is produced per map-layer request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceAddress {
    Simulated {
        attribute: String,
        name: String,
        datestr: Option<String>,
        realization: i32,
    },
    Statistical {
        attribute: String,
        name: String,
        datestr: Option<String>,
        statistic: SurfaceStatistic,
        realizations: Vec<i32>,
    },
    Truncated {
        name: String,
        datestr: String,
        realizations: Vec<i32>,
        basis_attribute: String,
        threshold: f64,
        smoothing: f64,
    },
}

/// Select the address variant for a map-layer request.
///
/// The branching order is significant: plume attributes always produce a
/// truncated address and migration-time attributes are never time-sliced,
/// both regardless of how many realizations are requested.
pub fn derive_surface_address(
    surface_name: &str,
    attribute: MapAttribute,
    date: Option<&str>,
    realizations: &[i32],
    names: &MapAttributeNames,
    statistic: SurfaceStatistic,
    contour_data: Option<&ContourParams>,
) -> Result<SurfaceAddress, CckError> {
    if realizations.is_empty() {
        return Err(CckError::InvalidSelection(
            "no realizations selected".to_string(),
        ));
    }
    if let Some(basis) = attribute.plume_basis() {
        let datestr = date.ok_or_else(|| {
            CckError::InvalidSelection(format!(
                "attribute {} requires a date for contouring",
                attribute.key()
            ))
        })?;
        return Ok(SurfaceAddress::Truncated {
            name: surface_name.to_string(),
            datestr: datestr.to_string(),
            realizations: realizations.to_vec(),
            basis_attribute: names.get(basis)?.to_string(),
            threshold: contour_data.map(|c| c.threshold).unwrap_or(0.0),
            smoothing: contour_data.map(|c| c.smoothing).unwrap_or(0.0),
        });
    }
    // Migration-time surfaces are not time-sliced.
    let datestr = if attribute.is_migration_time() {
        None
    } else {
        date.map(|d| d.to_string())
    };
    if realizations.len() == 1 {
        return Ok(SurfaceAddress::Simulated {
            attribute: names.get(attribute)?.to_string(),
            name: surface_name.to_string(),
            datestr,
            realization: realizations[0],
        });
    }
    Ok(SurfaceAddress::Statistical {
        attribute: names.get(attribute)?.to_string(),
        name: surface_name.to_string(),
        datestr,
        statistic,
        realizations: realizations.to_vec(),
    })
}
