use std::collections::HashMap;

use serde::Serialize;

use crate::error::CckError;
use crate::polygons::{EnsemblePolygonProvider, FeatureCollection};
use crate::surface::{MapAttribute, SurfaceAddress};

pub const COLORMAP_LAYER_ID: &str = "colormap-layer";
pub const FAULT_POLYGONS_LAYER_ID: &str = "fault-polygons-layer";
pub const CONTAINMENT_BOUNDARY_LAYER_ID: &str = "containment-boundary-layer";
pub const HAZARDOUS_BOUNDARY_LAYER_ID: &str = "hazardous-boundary-layer";
pub const WELL_PICKS_LAYER_ID: &str = "well-picks-layer";
pub const PLUME_CONTOUR_LAYER_ID: &str = "plume-contour-layer";

pub const CONTAINMENT_BOUNDARY_COLOR: [u8; 4] = [0, 172, 0, 120];
pub const HAZARDOUS_BOUNDARY_COLOR: [u8; 4] = [200, 0, 0, 120];
pub const PLUME_CONTOUR_COLOR: [u8; 4] = [150, 150, 150, 255];

/// Image metadata returned by the surface server for a published address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceImageMeta {
    /// `None` when the statistic masks out every cell.
    pub val_min: Option<f64>,
    pub val_max: Option<f64>,
    /// [xmin, ymin, xmax, ymax] in map coordinates.
    pub bounds: [f64; 4],
    pub rot_deg: f64,
}

/// External surface/image server: publishes the surface behind an address
/// and hands back its metadata, an image handle and (for mass attributes)
/// the summed mass. `None` metadata means the surface file does not exist
/// for this address, which is a valid empty state, not an error.
pub trait SurfaceImageServer {
    fn publish_and_get_metadata(
        &self,
        address: &SurfaceAddress,
        color_map_name: &str,
    ) -> Result<(Option<SurfaceImageMeta>, Option<String>, Option<f64>), CckError>;
}

/// Everything the colormap layer needs to render one surface image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceData {
    pub readable_name: String,
    pub color_map_range: (Option<f64>, Option<f64>),
    pub color_map_name: String,
    pub value_range: (f64, f64),
    pub meta: SurfaceImageMeta,
    pub img_url: String,
}

impl SurfaceData {
    /// Publish `address` and build the layer data. Returns `(None, None)`
    /// when the surface file is absent. A caller-supplied `None` bound
    /// auto-fills from the observed value range; masked metadata values
    /// count as 0.0.
    pub fn from_server(
        server: &dyn SurfaceImageServer,
        address: &SurfaceAddress,
        color_map_range: (Option<f64>, Option<f64>),
        color_map_name: &str,
        readable_name: String,
    ) -> Result<(Option<SurfaceData>, Option<f64>), CckError> {
        let (meta, img_url, summed_mass) =
            server.publish_and_get_metadata(address, color_map_name)?;
        let (Some(meta), Some(img_url)) = (meta, img_url) else {
            return Ok((None, None));
        };
        let value_range = (meta.val_min.unwrap_or(0.0), meta.val_max.unwrap_or(0.0));
        let color_map_range = (
            color_map_range.0.or(Some(value_range.0)),
            color_map_range.1.or(Some(value_range.1)),
        );
        Ok((
            Some(SurfaceData {
                readable_name,
                color_map_range,
                color_map_name: color_map_name.to_string(),
                value_range,
                meta,
                img_url,
            }),
            summed_mass,
        ))
    }
}

/// One renderable map layer. Serialized with a `kind` tag so the host map
/// component can dispatch on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MapLayer {
    Colormap {
        id: String,
        name: String,
        image: String,
        bounds: [f64; 4],
        value_range: (f64, f64),
        color_map_range: (Option<f64>, Option<f64>),
        color_map_name: String,
        rot_deg: f64,
    },
    FaultPolygons {
        id: String,
        name: String,
        data: String,
    },
    ContainmentBoundary {
        id: String,
        name: String,
        geometry: FeatureCollection,
        fill_color: [u8; 4],
    },
    HazardousBoundary {
        id: String,
        name: String,
        geometry: FeatureCollection,
        fill_color: [u8; 4],
    },
    WellPicks {
        id: String,
        name: String,
        geometry: FeatureCollection,
    },
    PlumeContour {
        id: String,
        name: String,
        geometry: FeatureCollection,
        line_width_min_pixels: u32,
        line_color: [u8; 4],
    },
}

impl MapLayer {
    pub fn id(&self) -> &str {
        match self {
            MapLayer::Colormap { id, .. }
            | MapLayer::FaultPolygons { id, .. }
            | MapLayer::ContainmentBoundary { id, .. }
            | MapLayer::HazardousBoundary { id, .. }
            | MapLayer::WellPicks { id, .. }
            | MapLayer::PlumeContour { id, .. } => id,
        }
    }
}

/// Inputs for one map update. Absent inputs skip their layer.
#[derive(Default)]
pub struct MapLayerRequest<'a> {
    pub realizations: &'a [i32],
    pub surface_data: Option<&'a SurfaceData>,
    pub fault_polygon_url: Option<&'a str>,
    pub containment_boundary: Option<&'a EnsemblePolygonProvider>,
    pub hazardous_boundary: Option<&'a EnsemblePolygonProvider>,
    pub well_pick_geometry: Option<&'a FeatureCollection>,
    pub plume_contour: Option<&'a FeatureCollection>,
}

/// Assemble the layer list in rendering z-order. The order is fixed and
/// stable across calls with identical inputs.
pub fn create_map_layers(request: &MapLayerRequest) -> Vec<MapLayer> {
    let mut layers = Vec::new();
    if let Some(surface) = request.surface_data {
        layers.push(MapLayer::Colormap {
            id: COLORMAP_LAYER_ID.to_string(),
            name: surface.readable_name.clone(),
            image: surface.img_url.clone(),
            bounds: surface.meta.bounds,
            value_range: surface.value_range,
            color_map_range: surface.color_map_range,
            color_map_name: surface.color_map_name.clone(),
            rot_deg: surface.meta.rot_deg,
        });
    }
    if let Some(url) = request.fault_polygon_url {
        layers.push(MapLayer::FaultPolygons {
            id: FAULT_POLYGONS_LAYER_ID.to_string(),
            name: "Fault Polygons".to_string(),
            data: url.to_string(),
        });
    }
    if let (Some(provider), Some(first)) =
        (request.containment_boundary, request.realizations.first())
    {
        if let Some(geometry) = provider.geometry_for(*first) {
            layers.push(MapLayer::ContainmentBoundary {
                id: CONTAINMENT_BOUNDARY_LAYER_ID.to_string(),
                name: "Containment Polygon".to_string(),
                geometry: geometry.clone(),
                fill_color: CONTAINMENT_BOUNDARY_COLOR,
            });
        }
    }
    if let (Some(provider), Some(first)) =
        (request.hazardous_boundary, request.realizations.first())
    {
        if let Some(geometry) = provider.geometry_for(*first) {
            layers.push(MapLayer::HazardousBoundary {
                id: HAZARDOUS_BOUNDARY_LAYER_ID.to_string(),
                name: "Hazardous Polygon".to_string(),
                geometry: geometry.clone(),
                fill_color: HAZARDOUS_BOUNDARY_COLOR,
            });
        }
    }
    if let Some(geometry) = request.well_pick_geometry {
        layers.push(MapLayer::WellPicks {
            id: WELL_PICKS_LAYER_ID.to_string(),
            name: "Well Picks".to_string(),
            geometry: geometry.clone(),
        });
    }
    if let Some(geometry) = request.plume_contour {
        layers.push(MapLayer::PlumeContour {
            id: PLUME_CONTOUR_LAYER_ID.to_string(),
            name: "Plume Contours".to_string(),
            geometry: geometry.clone(),
            line_width_min_pixels: 2,
            line_color: PLUME_CONTOUR_COLOR,
        });
    }
    layers
}

/// For single-realization mass attributes, remember the summed mass per
/// view key and annotate the layer title with it.
#[allow(clippy::too_many_arguments)]
pub fn process_summed_mass(
    formation: &str,
    realizations: &[i32],
    datestr: &str,
    attribute: MapAttribute,
    summed_mass: Option<f64>,
    mut surface_data: Option<SurfaceData>,
    summed_co2: &mut HashMap<String, f64>,
    unit: &str,
) -> Option<SurfaceData> {
    let Some(first) = realizations.first() else {
        return surface_data;
    };
    if realizations.len() == 1 && attribute.is_mass() {
        let key = format!("{formation}-{first}-{datestr}-{}-{unit}", attribute.key());
        if let Some(mass) = summed_mass {
            summed_co2.entry(key.clone()).or_insert(mass);
        }
        if let (Some(mass), Some(data)) = (summed_co2.get(&key), surface_data.as_mut()) {
            data.readable_name
                .push_str(&format!(" ({unit}) (Total: {mass:.2E})"));
        }
    }
    surface_data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MapAttributeNames, SurfaceStatistic};

    struct FakeServer {
        present: bool,
    }

    impl SurfaceImageServer for FakeServer {
        fn publish_and_get_metadata(
            &self,
            _address: &SurfaceAddress,
            _color_map_name: &str,
        ) -> Result<(Option<SurfaceImageMeta>, Option<String>, Option<f64>), CckError> {
            if !self.present {
                return Ok((None, None, None));
            }
            Ok((
                Some(SurfaceImageMeta {
                    val_min: None,
                    val_max: Some(0.8),
                    bounds: [0.0, 0.0, 100.0, 100.0],
                    rot_deg: 30.0,
                }),
                Some("/images/surface.png".to_string()),
                Some(1.5e9),
            ))
        }
    }

    fn address() -> SurfaceAddress {
        crate::surface::derive_surface_address(
            "topvolantis",
            MapAttribute::Mass,
            Some("2030-01-01"),
            &[0],
            &MapAttributeNames::default_names(),
            SurfaceStatistic::Mean,
            None,
        )
        .unwrap()
    }

    fn surface_data() -> SurfaceData {
        let server = FakeServer { present: true };
        let (data, _) = SurfaceData::from_server(
            &server,
            &address(),
            (None, Some(1.0)),
            "viridis",
            "Mass".to_string(),
        )
        .unwrap();
        data.unwrap()
    }

    #[test]
    fn absent_surface_is_a_valid_empty_state() {
        let server = FakeServer { present: false };
        let (data, mass) =
            SurfaceData::from_server(&server, &address(), (None, None), "viridis", "Mass".into())
                .unwrap();
        assert!(data.is_none());
        assert!(mass.is_none());
    }

    #[test]
    fn masked_metadata_and_auto_bounds_fill_from_value_range() {
        let data = surface_data();
        // Masked val_min counts as 0.0; the explicit upper bound wins.
        assert_eq!(data.value_range, (0.0, 0.8));
        assert_eq!(data.color_map_range, (Some(0.0), Some(1.0)));
    }

    #[test]
    fn layer_order_is_stable_and_skips_absent_inputs() {
        let data = surface_data();
        let contour = FeatureCollection::single(crate::polygons::Geometry::Polygon {
            coordinates: vec![vec![[0.0, 0.0], [1.0, 1.0]]],
        });
        let request = MapLayerRequest {
            realizations: &[0],
            surface_data: Some(&data),
            fault_polygon_url: Some("/polygons/faults.json"),
            plume_contour: Some(&contour),
            ..Default::default()
        };
        let layers = create_map_layers(&request);
        let ids: Vec<&str> = layers.iter().map(|l| l.id()).collect();
        assert_eq!(
            ids,
            vec![COLORMAP_LAYER_ID, FAULT_POLYGONS_LAYER_ID, PLUME_CONTOUR_LAYER_ID]
        );
        assert_eq!(create_map_layers(&request), layers);
    }

    #[test]
    fn layer_kind_tags_serialize_kebab_case() {
        let layers = create_map_layers(&MapLayerRequest {
            realizations: &[0],
            fault_polygon_url: Some("/polygons/faults.json"),
            ..Default::default()
        });
        let json = serde_json::to_value(&layers[0]).unwrap();
        assert_eq!(json["kind"], "fault-polygons");
        assert_eq!(json["id"], FAULT_POLYGONS_LAYER_ID);
    }

    #[test]
    fn summed_mass_annotates_single_realization_mass_layers() {
        let mut cache = HashMap::new();
        let data = process_summed_mass(
            "topvolantis",
            &[0],
            "2030-01-01",
            MapAttribute::Mass,
            Some(1.5e9),
            Some(surface_data()),
            &mut cache,
            "kg",
        )
        .unwrap();
        assert!(data.readable_name.contains("Total: 1.50E9"));

        // Multi-realization requests stay unannotated.
        let untouched = process_summed_mass(
            "topvolantis",
            &[0, 1],
            "2030-01-01",
            MapAttribute::Mass,
            Some(1.5e9),
            Some(surface_data()),
            &mut cache,
            "kg",
        )
        .unwrap();
        assert_eq!(untouched.readable_name, "Mass");
    }
}
