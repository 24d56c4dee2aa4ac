use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::containment::ContainmentDataProvider;
use crate::error::{CckError, InitializationErrors};
use crate::provider::CsvEnsembleTableProvider;
use crate::summary::UnsmryDataProvider;
use crate::surface::MapAttributeNames;

fn default_containment_relpath() -> String {
    "share/results/tables/co2_volumes.csv".to_string()
}

fn default_unsmry_relpath() -> String {
    "share/results/tables/unsmry--raw.csv".to_string()
}

fn default_fault_polygon_attribute() -> String {
    "dl_extracted_faultlines".to_string()
}

/// Static plugin-construction inputs. Nothing here is runtime-mutable.
#[derive(Debug, Clone, Deserialize)]
pub struct CO2LeakageConfig {
    /// Ensemble names to visualize, resolved to root directories by the host.
    pub ensembles: Vec<String>,
    /// Polygon file for the containment boundary.
    #[serde(default)]
    pub boundary_file: Option<String>,
    /// Polygon file for the hazardous boundary.
    #[serde(default)]
    pub hazardous_boundary_file: Option<String>,
    #[serde(default)]
    pub well_pick_file: Option<String>,
    /// Containment table, relative to each realization root.
    #[serde(default = "default_containment_relpath")]
    pub co2_containment_relpath: String,
    /// Summary table, relative to each realization root.
    #[serde(default = "default_unsmry_relpath")]
    pub unsmry_relpath: String,
    /// Polygons carrying this attribute are used as fault polygons.
    #[serde(default = "default_fault_polygon_attribute")]
    pub fault_polygon_attribute: String,
    /// Surface shown at launch; first alphabetical when unset.
    #[serde(default)]
    pub initial_surface: Option<String>,
    /// Overrides for the attribute-to-surface-name table.
    #[serde(default)]
    pub map_attribute_names: Option<HashMap<String, String>>,
    #[serde(default)]
    pub map_surface_names_to_well_pick_names: Option<HashMap<String, String>>,
    #[serde(default)]
    pub map_surface_names_to_fault_polygons: Option<HashMap<String, String>>,
}

pub fn init_map_attribute_names(
    overrides: Option<&HashMap<String, String>>,
) -> Result<MapAttributeNames, CckError> {
    match overrides {
        Some(mapping) => MapAttributeNames::from_overrides(mapping),
        None => Ok(MapAttributeNames::default_names()),
    }
}

/// Construct one containment provider per ensemble. A failing ensemble is
/// reported and skipped; the others continue to load.
pub fn init_containment_providers(
    ensemble_roots: &BTreeMap<String, PathBuf>,
    table_relpath: &str,
    errors: &mut InitializationErrors,
) -> HashMap<String, ContainmentDataProvider> {
    let mut providers = HashMap::new();
    for (ensemble, root) in ensemble_roots {
        match CsvEnsembleTableProvider::new(root, table_relpath)
            .and_then(|table| ContainmentDataProvider::new(Box::new(table)))
        {
            Ok(provider) => {
                providers.insert(ensemble.clone(), provider);
            }
            Err(err) => {
                warn!(ensemble = %ensemble, error = %err, "skipping containment table");
                errors.push(format!("ensemble \"{ensemble}\": {err}"));
            }
        }
    }
    providers
}

/// Construct one summary provider per ensemble, with the same per-ensemble
/// failure isolation as the containment side.
pub fn init_unsmry_providers(
    ensemble_roots: &BTreeMap<String, PathBuf>,
    table_relpath: &str,
    errors: &mut InitializationErrors,
) -> HashMap<String, UnsmryDataProvider> {
    let mut providers = HashMap::new();
    for (ensemble, root) in ensemble_roots {
        match CsvEnsembleTableProvider::new(root, table_relpath)
            .and_then(|table| UnsmryDataProvider::new(Box::new(table)))
        {
            Ok(provider) => {
                providers.insert(ensemble.clone(), provider);
            }
            Err(err) => {
                warn!(ensemble = %ensemble, error = %err, "skipping summary table");
                errors.push(format!("ensemble \"{ensemble}\": {err}"));
            }
        }
    }
    providers
}

/// Resolve the optional boundary/well-pick file paths per ensemble.
/// Absolute paths must exist; relative paths are joined onto the ensemble
/// root. A missing file degrades to `None` with a warning.
pub fn process_files(
    containment_boundary: Option<&str>,
    hazardous_boundary: Option<&str>,
    well_pick_file: Option<&str>,
    ensemble_roots: &BTreeMap<String, PathBuf>,
) -> [BTreeMap<String, Option<PathBuf>>; 3] {
    [containment_boundary, hazardous_boundary, well_pick_file].map(|source| {
        ensemble_roots
            .iter()
            .map(|(ensemble, root)| (ensemble.clone(), process_file(source, root)))
            .collect()
    })
}

fn process_file(file: Option<&str>, ensemble_root: &Path) -> Option<PathBuf> {
    let file = file?;
    let path = Path::new(file);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        ensemble_root.join(path)
    };
    if resolved.is_file() {
        Some(resolved)
    } else {
        warn!(path = %resolved.display(), "cannot find specified file, layer disabled");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_follow_the_fmu_table_layout() {
        let config: CO2LeakageConfig =
            serde_json::from_str(r#"{"ensembles": ["drogon_ahm"]}"#).unwrap();
        assert_eq!(
            config.co2_containment_relpath,
            "share/results/tables/co2_volumes.csv"
        );
        assert_eq!(config.unsmry_relpath, "share/results/tables/unsmry--raw.csv");
        assert_eq!(config.fault_polygon_attribute, "dl_extracted_faultlines");
        assert!(config.boundary_file.is_none());
    }

    #[test]
    fn unknown_attribute_override_key_is_invalid() {
        let mut overrides = HashMap::new();
        overrides.insert("NOT_AN_ATTRIBUTE".to_string(), "foo".to_string());
        let err = init_map_attribute_names(Some(&overrides)).unwrap_err();
        assert!(matches!(err, CckError::InvalidSelection(_)));
    }

    #[test]
    fn failing_ensemble_is_skipped_and_reported() {
        let dir = std::env::temp_dir().join(format!("cck-config-{}", std::process::id()));
        let good = dir.join("good");
        let bad = dir.join("bad");
        let table_dir = good.join("realization-0/tables");
        std::fs::create_dir_all(&table_dir).unwrap();
        std::fs::write(
            table_dir.join("co2.csv"),
            "date,amount,phase,containment,zone,region\n2020-01-01,1.0,total,contained,all,all\n",
        )
        .unwrap();
        // "bad" has a realization but no table file at all.
        std::fs::create_dir_all(bad.join("realization-0")).unwrap();

        let mut roots = BTreeMap::new();
        roots.insert("good".to_string(), good);
        roots.insert("bad".to_string(), bad);

        let mut errors = InitializationErrors::default();
        let providers = init_containment_providers(&roots, "tables/co2.csv", &mut errors);
        assert!(providers.contains_key("good"));
        assert!(!providers.contains_key("bad"));
        assert_eq!(errors.0.len(), 1);
        assert!(errors.to_string().contains("bad"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_optional_files_degrade_to_none() {
        let dir = std::env::temp_dir().join(format!("cck-files-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("boundary.csv"), "x,y\n0,0\n").unwrap();

        let mut roots = BTreeMap::new();
        roots.insert("ens".to_string(), dir.clone());

        let [containment, hazardous, wells] = process_files(
            Some("boundary.csv"),
            Some("no_such_file.csv"),
            None,
            &roots,
        );
        assert!(containment["ens"].is_some());
        assert!(hazardous["ens"].is_none());
        assert!(wells["ens"].is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
