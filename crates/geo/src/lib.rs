//! Raster hotspot analysis for GeoChain.
//!
//! Crops an intensity raster to a country's bounding box, computes zonal
//! statistics over the valid (positive) cells and reports clusters of cells
//! above a percentile threshold, ranked by intensity.

pub mod analyzer;
pub mod ascii_grid;
pub mod bounds;
pub mod hotspot;
pub mod raster;
pub mod stats;

pub use analyzer::{AnalysisError, CountryAnalysis, CountryReport, HotspotAnalyzer, RegionAnalysis};
pub use ascii_grid::{parse_ascii_grid, read_ascii_grid};
pub use bounds::{Bounds, BoundsResolver, BoundsTable};
pub use hotspot::{detect_hotspots, Connectivity, Hotspot, HotspotParams};
pub use raster::{GeoTransform, Raster};
pub use stats::{zonal_statistics, ZonalStatistics};
