//! ESRI ASCII grid (`.asc`) reader.
//!
//! ```text
//! ncols        4
//! nrows        3
//! xllcorner    -12.0
//! yllcorner    10.0
//! cellsize     0.5
//! NODATA_value -9999
//! 0 1 2 3
//! ...
//! ```
//!
//! Cells equal to `NODATA_value` are stored as NaN.

use crate::raster::{GeoTransform, Raster};
use geochain_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

const HEADER_KEYS: [&str; 8] = [
    "ncols",
    "nrows",
    "xllcorner",
    "yllcorner",
    "xllcenter",
    "yllcenter",
    "cellsize",
    "nodata_value",
];

/// Read an ESRI ASCII grid from disk.
pub fn read_ascii_grid(path: &Path) -> AppResult<Raster> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Raster(format!("Failed to read raster {:?}: {}", path, e)))?;
    let raster = parse_ascii_grid(&contents)
        .map_err(|e| AppError::Raster(format!("{:?}: {}", path, e)))?;
    tracing::info!(
        width = raster.width(),
        height = raster.height(),
        "Loaded raster from {:?}",
        path
    );
    Ok(raster)
}

/// Parse the text of an ESRI ASCII grid.
pub fn parse_ascii_grid(contents: &str) -> AppResult<Raster> {
    let mut header: HashMap<&'static str, f64> = HashMap::new();
    let mut values: Vec<f64> = Vec::new();

    for (line_num, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let key = HEADER_KEYS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(first))
            .copied();

        match key {
            Some(key) if values.is_empty() => {
                let value = tokens
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| {
                        AppError::Raster(format!(
                            "Line {}: header '{}' has no numeric value",
                            line_num + 1,
                            first
                        ))
                    })?;
                header.insert(key, value);
            }
            _ => {
                for token in trimmed.split_whitespace() {
                    let value = token.parse::<f64>().map_err(|_| {
                        AppError::Raster(format!(
                            "Line {}: invalid cell value '{}'",
                            line_num + 1,
                            token
                        ))
                    })?;
                    values.push(value);
                }
            }
        }
    }

    let ncols = required_dim(&header, "ncols")?;
    let nrows = required_dim(&header, "nrows")?;
    let cell_size = required(&header, "cellsize")?;
    if cell_size <= 0.0 {
        return Err(AppError::Raster(format!(
            "cellsize must be positive, got {}",
            cell_size
        )));
    }

    let half = cell_size / 2.0;
    let x_left = match (header.get("xllcorner"), header.get("xllcenter")) {
        (Some(x), _) => *x,
        (None, Some(x)) => x - half,
        (None, None) => return Err(missing("xllcorner")),
    };
    let y_bottom = match (header.get("yllcorner"), header.get("yllcenter")) {
        (Some(y), _) => *y,
        (None, Some(y)) => y - half,
        (None, None) => return Err(missing("yllcorner")),
    };

    if let Some(nodata) = header.get("nodata_value") {
        for value in values.iter_mut() {
            if *value == *nodata {
                *value = f64::NAN;
            }
        }
    }

    let transform = GeoTransform::north_up(x_left, y_bottom + nrows as f64 * cell_size, cell_size);
    Raster::new(ncols, nrows, values, transform)
}

fn missing(key: &str) -> AppError {
    AppError::Raster(format!("Missing header '{}'", key))
}

fn required(header: &HashMap<&'static str, f64>, key: &str) -> AppResult<f64> {
    header.get(key).copied().ok_or_else(|| missing(key))
}

fn required_dim(header: &HashMap<&'static str, f64>, key: &str) -> AppResult<usize> {
    let value = required(header, key)?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(AppError::Raster(format!(
            "Header '{}' must be a non-negative integer, got {}",
            key, value
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ncols 3
nrows 2
xllcorner -12.0
yllcorner 10.0
cellsize 0.5
NODATA_value -9999
1 2 -9999
4 5 6
";

    #[test]
    fn test_parse_sample() {
        let raster = parse_ascii_grid(SAMPLE).unwrap();
        assert_eq!(raster.width(), 3);
        assert_eq!(raster.height(), 2);
        assert_eq!(raster.get(1, 2), Some(6.0));
        assert!(raster.get(0, 2).unwrap().is_nan());
        // Top-left centre: x = -12 + 0.25, y = 10 + 2*0.5 - 0.25
        assert_eq!(raster.transform().xy(0, 0), (-11.75, 10.75));
    }

    #[test]
    fn test_center_registration() {
        let grid = "ncols 1\nnrows 1\nxllcenter 0.5\nyllcenter 0.5\ncellsize 1\n7\n";
        let raster = parse_ascii_grid(grid).unwrap();
        assert_eq!(raster.transform().xy(0, 0), (0.5, 0.5));
    }

    #[test]
    fn test_cell_count_mismatch() {
        let grid = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        assert!(parse_ascii_grid(grid).is_err());
    }

    #[test]
    fn test_missing_cellsize() {
        let grid = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\n1\n";
        assert!(parse_ascii_grid(grid).is_err());
    }

    #[test]
    fn test_invalid_value() {
        let grid = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nabc\n";
        assert!(parse_ascii_grid(grid).is_err());
    }
}
