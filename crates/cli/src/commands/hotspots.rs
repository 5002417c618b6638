//! Hotspots command handler.

use super::{hotspot_analyzer, print_json};
use clap::Args;
use geochain_core::{AppConfig, AppResult};
use std::path::PathBuf;

/// Infrastructure hotspot report for a country
#[derive(Args, Debug)]
pub struct HotspotsCommand {
    /// Country to analyze
    pub country: String,

    /// ESRI ASCII grid (.asc) with intensity values
    #[arg(long)]
    pub raster: Option<PathBuf>,

    /// YAML or JSON table of country bounding boxes
    #[arg(long)]
    pub bounds: Option<PathBuf>,

    /// Threshold percentile (0-100)
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Minimum cells per hotspot cluster
    #[arg(long)]
    pub min_cluster: Option<usize>,

    /// Cell connectivity (4 or 8)
    #[arg(long)]
    pub connectivity: Option<u8>,

    /// Maximum hotspots to report
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HotspotsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing hotspots command for {}", self.country);

        let mut settings = config.hotspots.clone();
        if let Some(p) = self.percentile {
            settings.threshold_percentile = p;
        }
        if let Some(n) = self.min_cluster {
            settings.min_cluster_size = n;
        }
        if let Some(c) = self.connectivity {
            settings.connectivity = c;
        }
        if let Some(limit) = self.limit {
            settings.max_hotspots = limit;
        }
        settings.validate()?;

        let analyzer = hotspot_analyzer(
            config,
            &settings,
            self.raster.as_deref(),
            self.bounds.as_deref(),
        )?;
        let analysis = analyzer.analyze_country(&self.country);

        if self.json {
            print_json(&analysis)?;
        } else {
            println!("{}", analysis.to_markdown());
        }

        Ok(())
    }
}
