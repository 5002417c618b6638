//! Hotspot detection: percentile threshold plus connected-component
//! clustering of the cells above it.

use std::collections::VecDeque;

use crate::raster::Raster;
use crate::stats::{is_valid, percentile, sorted_valid_values};
use geochain_core::{AppError, AppResult, HotspotSettings};
use serde::{Deserialize, Serialize};

/// Pixel neighbourhood used when labeling clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and corner neighbours
    Eight,
}

impl TryFrom<u8> for Connectivity {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(AppError::Raster(format!(
                "Connectivity must be 4 or 8, got {}",
                other
            ))),
        }
    }
}

impl Connectivity {
    fn offsets(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// A cluster of high-intensity cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub lat: f64,
    pub lon: f64,
    /// Raster value at the cluster centroid
    pub intensity: f64,
    /// Number of pixels in the cluster
    pub cluster_size: usize,
    /// 1-based rank by descending intensity
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotspotParams {
    pub threshold_percentile: f64,
    pub min_cluster_size: usize,
    pub connectivity: Connectivity,
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            threshold_percentile: 90.0,
            min_cluster_size: 5,
            connectivity: Connectivity::Four,
        }
    }
}

impl TryFrom<&HotspotSettings> for HotspotParams {
    type Error = AppError;

    fn try_from(settings: &HotspotSettings) -> Result<Self, Self::Error> {
        settings.validate()?;
        Ok(Self {
            threshold_percentile: settings.threshold_percentile,
            min_cluster_size: settings.min_cluster_size,
            connectivity: Connectivity::try_from(settings.connectivity)?,
        })
    }
}

/// Detect hotspots in `raster`, ranked by descending centroid intensity.
///
/// Returns an empty list when the raster has no valid cells. Fails only on
/// a percentile outside 0..=100.
pub fn detect_hotspots(raster: &Raster, params: &HotspotParams) -> AppResult<Vec<Hotspot>> {
    if !(0.0..=100.0).contains(&params.threshold_percentile) {
        return Err(AppError::Raster(format!(
            "Threshold percentile must be within 0..=100, got {}",
            params.threshold_percentile
        )));
    }

    let values = sorted_valid_values(raster);
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let threshold = percentile(&values, params.threshold_percentile);
    let mask: Vec<bool> = raster
        .data()
        .iter()
        .map(|v| is_valid(*v) && *v > threshold)
        .collect();

    let clusters = label_components(&mask, raster.width(), raster.height(), params.connectivity);
    tracing::debug!(
        threshold,
        clusters = clusters.len(),
        "Labeled connected components"
    );

    let mut hotspots: Vec<Hotspot> = clusters
        .into_iter()
        .filter(|pixels| pixels.len() >= params.min_cluster_size)
        .map(|pixels| {
            let n = pixels.len();
            let row = pixels.iter().map(|(r, _)| *r).sum::<usize>() / n;
            let col = pixels.iter().map(|(_, c)| *c).sum::<usize>() / n;
            let (lon, lat) = raster.transform().xy(row, col);
            let intensity = raster
                .get(row, col)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);
            Hotspot {
                lat,
                lon,
                intensity,
                cluster_size: n,
                rank: 0,
            }
        })
        .collect();

    hotspots.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    for (i, hotspot) in hotspots.iter_mut().enumerate() {
        hotspot.rank = i + 1;
    }

    Ok(hotspots)
}

/// Group the `true` cells of a row-major mask into connected components.
///
/// Components are returned in order of their first cell in row-major scan
/// order; each is a list of `(row, col)` pixels.
pub fn label_components(
    mask: &[bool],
    width: usize,
    height: usize,
    connectivity: Connectivity,
) -> Vec<Vec<(usize, usize)>> {
    let mut visited = vec![false; mask.len()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        queue.push_back(start);
        let mut pixels = Vec::new();

        while let Some(idx) = queue.pop_front() {
            let (row, col) = (idx / width, idx % width);
            pixels.push((row, col));

            for (dr, dc) in connectivity.offsets() {
                let (Some(r), Some(c)) = (row.checked_add_signed(*dr), col.checked_add_signed(*dc))
                else {
                    continue;
                };
                if r >= height || c >= width {
                    continue;
                }
                let neighbour = r * width + c;
                if mask[neighbour] && !visited[neighbour] {
                    visited[neighbour] = true;
                    queue.push_back(neighbour);
                }
            }
        }

        components.push(pixels);
    }

    components
}
