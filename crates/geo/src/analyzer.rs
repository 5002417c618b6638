//! Country-level hotspot analysis and reporting.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::bounds::{Bounds, BoundsResolver};
use crate::hotspot::{detect_hotspots, Hotspot, HotspotParams};
use crate::raster::Raster;
use crate::stats::{zonal_statistics, ZonalStatistics};
use geochain_core::{AppResult, HotspotSettings};
use serde::Serialize;

/// Mean intensity above which density is reported as high.
const HIGH_DENSITY_MEAN: f64 = 50.0;
/// Mean intensity above which density is reported as moderate.
const MODERATE_DENSITY_MEAN: f64 = 20.0;
/// Std/mean ratio above which the distribution is reported as uneven.
const UNEVEN_RATIO: f64 = 0.5;

/// Statistics and every detected hotspot for one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionAnalysis {
    pub statistics: ZonalStatistics,
    pub hotspots: Vec<Hotspot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryReport {
    pub country: String,
    pub bounds: Bounds,
    pub statistics: ZonalStatistics,
    /// Top hotspots, limited to the configured maximum
    pub hotspots: Vec<Hotspot>,
    pub total_hotspots_detected: usize,
}

/// Structured failure for a country that cannot be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisError {
    pub country: String,
    pub error: String,
}

/// Result of [`HotspotAnalyzer::analyze_country`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CountryAnalysis {
    Report(CountryReport),
    Error(AnalysisError),
}

impl CountryAnalysis {
    pub fn to_markdown(&self) -> String {
        match self {
            Self::Report(report) => report.to_markdown(),
            Self::Error(err) => format!("Could not analyze {}: {}", err.country, err.error),
        }
    }
}

pub struct HotspotAnalyzer {
    raster: Arc<Raster>,
    bounds: Arc<dyn BoundsResolver>,
    params: HotspotParams,
    max_hotspots: usize,
}

impl HotspotAnalyzer {
    pub fn new(
        raster: Arc<Raster>,
        bounds: Arc<dyn BoundsResolver>,
        settings: &HotspotSettings,
    ) -> AppResult<Self> {
        Ok(Self {
            raster,
            bounds,
            params: HotspotParams::try_from(settings)?,
            max_hotspots: settings.max_hotspots,
        })
    }

    /// Statistics and hotspots inside `bounds`.
    pub fn analyze_bounds(&self, bounds: &Bounds) -> AppResult<RegionAnalysis> {
        let region = self.raster.crop(bounds)?;
        let statistics = zonal_statistics(&region);
        let hotspots = if statistics.count == 0 {
            Vec::new()
        } else {
            detect_hotspots(&region, &self.params)?
        };

        Ok(RegionAnalysis {
            statistics,
            hotspots,
        })
    }

    /// Analyze a country by name. Never fails: unknown countries and raster
    /// errors come back as [`CountryAnalysis::Error`].
    pub fn analyze_country(&self, country: &str) -> CountryAnalysis {
        let Some(bounds) = self.bounds.resolve(country) else {
            tracing::warn!(country, "No bounds available");
            return CountryAnalysis::Error(AnalysisError {
                country: country.to_string(),
                error: "Country bounds not found".to_string(),
            });
        };

        match self.analyze_bounds(&bounds) {
            Ok(RegionAnalysis {
                statistics,
                mut hotspots,
            }) => {
                let total_hotspots_detected = hotspots.len();
                hotspots.truncate(self.max_hotspots);
                tracing::info!(
                    country,
                    valid_cells = statistics.count,
                    hotspots = total_hotspots_detected,
                    "Hotspot analysis complete"
                );
                CountryAnalysis::Report(CountryReport {
                    country: country.to_string(),
                    bounds,
                    statistics,
                    hotspots,
                    total_hotspots_detected,
                })
            }
            Err(e) => CountryAnalysis::Error(AnalysisError {
                country: country.to_string(),
                error: e.to_string(),
            }),
        }
    }
}

impl CountryReport {
    pub fn density_level(&self) -> &'static str {
        let mean = self.statistics.mean;
        if mean > HIGH_DENSITY_MEAN {
            "high"
        } else if mean > MODERATE_DENSITY_MEAN {
            "moderate"
        } else {
            "low"
        }
    }

    pub fn is_uneven(&self) -> bool {
        self.statistics.std > UNEVEN_RATIO * self.statistics.mean
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.statistics;
        let mut out = format!("## Infrastructure Hotspots: {}\n\n", self.country);

        if s.count == 0 {
            out.push_str("No valid raster cells fall inside this country's bounds.\n");
            return out;
        }

        let _ = writeln!(out, "**Density statistics** ({} valid cells)", s.count);
        let _ = writeln!(out, "- Mean: {:.2}", s.mean);
        let _ = writeln!(out, "- Median: {:.2}", s.median);
        let _ = writeln!(out, "- Std deviation: {:.2}", s.std);
        let _ = writeln!(out, "- Range: {:.2} to {:.2}", s.min, s.max);
        let _ = writeln!(out, "- 90th percentile: {:.2}\n", s.p90);

        let _ = writeln!(
            out,
            "**Interpretation:** {} has {} infrastructure density; the distribution is {}.\n",
            self.country,
            self.density_level(),
            if self.is_uneven() {
                "uneven, concentrated in a few areas"
            } else {
                "relatively even"
            }
        );

        if self.hotspots.is_empty() {
            out.push_str("No hotspot clusters met the minimum size.\n");
        } else {
            let _ = writeln!(
                out,
                "**Top hotspots** (showing {} of {}):",
                self.hotspots.len(),
                self.total_hotspots_detected
            );
            for h in &self.hotspots {
                let _ = writeln!(
                    out,
                    "{}. ({:.4}, {:.4}): intensity {:.2}, {} cells",
                    h.rank, h.lat, h.lon, h.intensity, h.cluster_size
                );
            }
        }

        out
    }
}
