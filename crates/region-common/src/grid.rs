//! Affine grid transforms for regular lat/lon rasters.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};
use crate::BoundingBox;

/// Shape of one 2-D grid slice: rows along latitude, columns along longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// Affine transform mapping (row, col) cell corners to (x, y) coordinates.
///
/// Follows the GDAL/rasterio coefficient layout:
///
/// ```text
/// x = c + col * a + row * b
/// y = f + col * d + row * e
/// ```
///
/// Only north-up/south-up grids are produced here, so `b` and `d` are zero.
/// `e` is negative when latitude decreases with the row index.
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
    /// Build a transform from origin (outer corner of cell 0,0) and signed resolutions.
    pub fn from_origin(x_origin: f64, y_origin: f64, x_res: f64, y_res: f64) -> Self {
        Self {
            a: x_res,
            b: 0.0,
            c: x_origin,
            d: 0.0,
            e: y_res,
            f: y_origin,
        }
    }

    /// Infer the transform from 1-D cell-centre coordinate vectors.
    ///
    /// The resolution is the mean spacing of each axis; the origin sits half a
    /// cell before the first centre. Axes must have at least two samples and
    /// be regularly spaced.
    pub fn from_coordinates(lon: &[f64], lat: &[f64]) -> CommonResult<Self> {
        let x_res = regular_spacing("lon", lon)?;
        let y_res = regular_spacing("lat", lat)?;

        Ok(Self::from_origin(
            lon[0] - x_res / 2.0,
            lat[0] - y_res / 2.0,
            x_res,
            y_res,
        ))
    }

    /// Coordinates of the centre of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let col = col as f64 + 0.5;
        let row = row as f64 + 0.5;
        (
            self.c + col * self.a + row * self.b,
            self.f + col * self.d + row * self.e,
        )
    }

    /// Fractional column index whose centre is at `x` (axis-aligned transforms only).
    pub fn col_at(&self, x: f64) -> f64 {
        (x - self.c) / self.a - 0.5
    }

    /// Fractional row index whose centre is at `y` (axis-aligned transforms only).
    pub fn row_at(&self, y: f64) -> f64 {
        (y - self.f) / self.e - 0.5
    }

    /// Outer extent of a grid of the given shape.
    pub fn bounds(&self, shape: GridShape) -> BoundingBox {
        let x0 = self.c;
        let x1 = self.c + shape.cols as f64 * self.a;
        let y0 = self.f;
        let y1 = self.f + shape.rows as f64 * self.e;
        BoundingBox {
            lon_min: x0.min(x1),
            lon_max: x0.max(x1),
            lat_min: y0.min(y1),
            lat_max: y0.max(y1),
        }
    }

    /// Stable hash key for caching by transform.
    pub fn cache_key(&self) -> [u64; 6] {
        [
            self.a.to_bits(),
            self.b.to_bits(),
            self.c.to_bits(),
            self.d.to_bits(),
            self.e.to_bits(),
            self.f.to_bits(),
        ]
    }
}

fn regular_spacing(axis: &str, values: &[f64]) -> CommonResult<f64> {
    let invalid = |message: String| CommonError::InvalidAxis {
        axis: axis.to_string(),
        message,
    };

    if values.len() < 2 {
        return Err(invalid(format!(
            "need at least 2 samples to infer resolution, got {}",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid("non-finite coordinate value".to_string()));
    }

    let n = values.len();
    let res = (values[n - 1] - values[0]) / (n - 1) as f64;
    if res == 0.0 {
        return Err(invalid("zero spacing".to_string()));
    }

    // Coordinates stored as f32 drift by ~1e-6 degrees per step.
    let tolerance = (res.abs() * 1e-3).max(1e-9);
    for (i, pair) in values.windows(2).enumerate() {
        let step = pair[1] - pair[0];
        if (step - res).abs() > tolerance {
            return Err(invalid(format!(
                "irregular spacing at index {}: step {} vs mean {}",
                i, step, res
            )));
        }
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_coordinates_descending_lat() {
        let lon = [10.5, 11.5, 12.5];
        let lat = [52.5, 51.5];
        let t = GeoTransform::from_coordinates(&lon, &lat).unwrap();

        assert_eq!(t.a, 1.0);
        assert_eq!(t.e, -1.0);
        assert_eq!(t.c, 10.0);
        assert_eq!(t.f, 53.0);
        assert_eq!(t.cell_center(0, 0), (10.5, 52.5));
        assert_eq!(t.cell_center(1, 2), (12.5, 51.5));
    }

    #[test]
    fn test_bounds_and_inverse() {
        let t = GeoTransform::from_origin(0.0, 0.0, 0.5, 0.5);
        let b = t.bounds(GridShape::new(4, 2));
        assert_eq!((b.lon_min, b.lon_max, b.lat_min, b.lat_max), (0.0, 1.0, 0.0, 2.0));
        assert_eq!(t.col_at(0.25), 0.0);
        assert_eq!(t.row_at(1.75), 3.0);
    }

    #[test]
    fn test_single_sample_axis_rejected() {
        assert!(GeoTransform::from_coordinates(&[1.0], &[1.0, 2.0]).is_err());
        assert!(GeoTransform::from_coordinates(&[1.0, 2.0, 4.0], &[1.0, 2.0]).is_err());
    }
}
