//! In-memory raster grid with an affine geotransform.

use crate::bounds::Bounds;
use geochain_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Affine transform from pixel space to geographic coordinates.
///
/// For a pixel at (`col`, `row`):
/// `x = a * col + b * row + c`, `y = d * col + e * row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the top-left corner of the grid.
    pub fn north_up(top_left_x: f64, top_left_y: f64, cell_size: f64) -> Self {
        Self {
            a: cell_size,
            b: 0.0,
            c: top_left_x,
            d: 0.0,
            e: -cell_size,
            f: top_left_y,
        }
    }

    /// Geographic coordinates `(x, y)` of the centre of a pixel.
    pub fn xy(&self, row: usize, col: usize) -> (f64, f64) {
        let col = col as f64 + 0.5;
        let row = row as f64 + 0.5;
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    fn is_rectilinear(&self) -> bool {
        self.b == 0.0 && self.d == 0.0 && self.a != 0.0 && self.e != 0.0
    }

    /// Transform of a window starting at (`row_off`, `col_off`).
    fn shifted(&self, row_off: usize, col_off: usize) -> Self {
        let (col, row) = (col_off as f64, row_off as f64);
        Self {
            c: self.a * col + self.b * row + self.c,
            f: self.d * col + self.e * row + self.f,
            ..*self
        }
    }
}

/// Row-major grid of intensities. Cells that are non-finite or non-positive
/// carry no data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    data: Vec<f64>,
    transform: GeoTransform,
}

impl Raster {
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<f64>,
        transform: GeoTransform,
    ) -> AppResult<Self> {
        if data.len() != width * height {
            return Err(AppError::Raster(format!(
                "Raster data has {} cells, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            transform,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.height && col < self.width {
            self.data.get(row * self.width + col).copied()
        } else {
            None
        }
    }

    /// Cut out the window covering `bounds`. A bound outside the raster
    /// yields an empty (0x0) raster, not an error.
    pub fn crop(&self, bounds: &Bounds) -> AppResult<Raster> {
        let t = &self.transform;
        if !t.is_rectilinear() {
            return Err(AppError::Raster(
                "Cropping rotated rasters is not supported".to_string(),
            ));
        }

        let (col_start, col_end) = pixel_span(bounds.min_lon, bounds.max_lon, t.c, t.a, self.width);
        let (row_start, row_end) = pixel_span(bounds.min_lat, bounds.max_lat, t.f, t.e, self.height);

        if col_start >= col_end || row_start >= row_end {
            return Raster::new(0, 0, Vec::new(), t.shifted(0, 0));
        }

        let width = col_end - col_start;
        let height = row_end - row_start;
        let mut data = Vec::with_capacity(width * height);
        for row in row_start..row_end {
            let start = row * self.width + col_start;
            data.extend_from_slice(&self.data[start..start + width]);
        }

        Raster::new(width, height, data, t.shifted(row_start, col_start))
    }
}

/// Pixel range `[start, end)` along one axis covering the coordinate span
/// `[lo, hi]`, clamped to `[0, len]`.
fn pixel_span(lo: f64, hi: f64, origin: f64, step: f64, len: usize) -> (usize, usize) {
    let p0 = (lo - origin) / step;
    let p1 = (hi - origin) / step;
    let (first, last) = if p0 <= p1 { (p0, p1) } else { (p1, p0) };

    let clamp = |v: f64| -> usize {
        if v <= 0.0 {
            0
        } else if v >= len as f64 {
            len
        } else {
            v as usize
        }
    };

    (clamp(first.floor()), clamp(last.ceil()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Raster {
        // 4 columns x 3 rows, 1-degree cells, top-left at (0, 3)
        let data = (1..=12).map(f64::from).collect();
        Raster::new(4, 3, data, GeoTransform::north_up(0.0, 3.0, 1.0)).unwrap()
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = Raster::new(2, 2, vec![1.0; 3], GeoTransform::north_up(0.0, 0.0, 1.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_xy_is_pixel_centre() {
        let raster = grid();
        assert_eq!(raster.transform().xy(0, 0), (0.5, 2.5));
        assert_eq!(raster.transform().xy(2, 3), (3.5, 0.5));
    }

    #[test]
    fn test_crop_window() {
        let raster = grid();
        let cropped = raster.crop(&Bounds::new(1.0, 1.0, 3.0, 3.0).unwrap()).unwrap();

        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.data(), &[2.0, 3.0, 6.0, 7.0]);
        assert_eq!(cropped.transform().xy(0, 0), (1.5, 2.5));
    }

    #[test]
    fn test_crop_partial_cells_included() {
        let raster = grid();
        let cropped = raster.crop(&Bounds::new(0.5, 0.2, 1.2, 0.8).unwrap()).unwrap();
        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 1);
        assert_eq!(cropped.data(), &[9.0, 10.0]);
    }

    #[test]
    fn test_crop_outside_is_empty() {
        let raster = grid();
        let cropped = raster.crop(&Bounds::new(10.0, 10.0, 12.0, 12.0).unwrap()).unwrap();
        assert_eq!(cropped.width() * cropped.height(), 0);
    }
}
