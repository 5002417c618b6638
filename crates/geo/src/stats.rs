//! Zonal statistics over the valid cells of a raster.

use crate::raster::Raster;
use serde::Serialize;

/// Descriptive statistics of the valid cells in a region. All fields are
/// zero when the region has no valid cells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ZonalStatistics {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: usize,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// A cell carries data when it is finite and strictly positive.
pub fn is_valid(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Valid cell values sorted ascending.
pub fn sorted_valid_values(raster: &Raster) -> Vec<f64> {
    let mut values: Vec<f64> = raster.data().iter().copied().filter(|v| is_valid(*v)).collect();
    values.sort_by(f64::total_cmp);
    values
}

pub fn zonal_statistics(raster: &Raster) -> ZonalStatistics {
    let values = sorted_valid_values(raster);
    if values.is_empty() {
        return ZonalStatistics::default();
    }

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    ZonalStatistics {
        mean,
        median: percentile(&values, 50.0),
        std: variance.sqrt(),
        min: values[0],
        max: values[count - 1],
        sum,
        count,
        p75: percentile(&values, 75.0),
        p90: percentile(&values, 90.0),
        p95: percentile(&values, 95.0),
    }
}

/// Percentile `q` (0..=100) of ascending `sorted` values using linear
/// interpolation between closest ranks. Returns 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn raster(data: Vec<f64>) -> Raster {
        let width = data.len();
        Raster::new(width, 1, data, GeoTransform::north_up(0.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_all_zero_region() {
        let stats = zonal_statistics(&raster(vec![0.0; 16]));
        assert_eq!(stats.count, 0);
        assert_eq!(stats, ZonalStatistics::default());
    }

    #[test]
    fn test_nodata_excluded() {
        let stats = zonal_statistics(&raster(vec![0.0, -3.0, f64::NAN, 2.0, 4.0]));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.std, 1.0);
    }

    #[test]
    fn test_linear_percentiles() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 75.0), 4.0);
        assert!((percentile(&values, 90.0) - 4.6).abs() < 1e-9);
        assert!((percentile(&values, 95.0) - 4.8).abs() < 1e-9);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
    }

    #[test]
    fn test_even_count_median() {
        let stats = zonal_statistics(&raster(vec![4.0, 1.0, 3.0, 2.0]));
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.sum, 10.0);
    }
}
