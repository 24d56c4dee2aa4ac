//! Data-derivation pipeline for CO2 containment dashboards.
//!
//! Reads per-realization containment and reservoir-summary tables plus
//! polygon file trees, and derives what the map-and-plots UI consumes:
//! menu enumerations, scaled dataframes, declarative plot series, surface
//! addresses and ordered map-layer records. The dashboard framework, the
//! surface image server and the chart renderer are external collaborators
//! behind narrow interfaces.

pub mod comparison;
pub mod config;
pub mod containment;
pub mod convention;
pub mod error;
pub mod figures;
pub mod layers;
pub mod polygons;
pub mod provider;
pub mod scale;
pub mod schema;
pub mod summary;
pub mod surface;

pub use comparison::{build_comparison, LineStyle, PlotDataset, PlotSeries};
pub use config::CO2LeakageConfig;
pub use containment::{ContainmentDataProvider, MenuOptions};
pub use error::{CckError, InitializationErrors};
pub use figures::{
    terminal_containment_data, time_containment_data, time_mobile_outside_data,
    TerminalVolumeRecord,
};
pub use layers::{create_map_layers, MapLayer, MapLayerRequest, SurfaceData, SurfaceImageServer};
pub use polygons::EnsemblePolygonProvider;
pub use provider::{CsvEnsembleTableProvider, InMemoryTableProvider, TableProvider};
pub use scale::{apply_scale, Co2Scale};
pub use summary::UnsmryDataProvider;
pub use surface::{
    derive_surface_address, MapAttribute, MapAttributeNames, SurfaceAddress, SurfaceStatistic,
};
