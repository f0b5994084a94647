//! Common test fixtures for regional climate tests.
//!
//! Pre-defined boxes, grids and region geometries that mirror the shapes the
//! pipeline sees in production, scaled down.

use std::path::{Path, PathBuf};

/// Common bounding boxes as (lon_min, lon_max, lat_min, lat_max).
pub mod bbox {
    /// Covers the whole of `grid::SMALL`
    pub const SMALL_ALL: (f64, f64, f64, f64) = (9.0, 16.0, 49.0, 54.0);

    /// Strictly between sample points of `grid::SMALL` on both axes
    pub const BETWEEN_SAMPLES: (f64, f64, f64, f64) = (10.2, 10.4, 50.2, 50.4);
}

/// Common grid specifications for testing.
pub mod grid {
    /// 6 x 4 one-degree grid, latitude descending like EMO-1 files.
    pub const SMALL: GridSpec = GridSpec {
        nlon: 6,
        nlat: 4,
        lon0: 10.0,
        lat0: 53.0,
        dlon: 1.0,
        dlat: -1.0,
    };

    /// Regular grid described by its first cell centre and signed spacing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nlon: usize,
        pub nlat: usize,
        pub lon0: f64,
        pub lat0: f64,
        pub dlon: f64,
        pub dlat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.nlon * self.nlat
        }

        /// Longitude cell centres.
        pub fn lons(&self) -> Vec<f64> {
            crate::generators::regular_axis(self.lon0, self.dlon, self.nlon)
        }

        /// Latitude cell centres.
        pub fn lats(&self) -> Vec<f64> {
            crate::generators::regular_axis(self.lat0, self.dlat, self.nlat)
        }

        /// Outer corners of cell (row, col) as (lon_min, lat_min, lon_max, lat_max).
        pub fn cell_bounds(&self, row: usize, col: usize) -> (f64, f64, f64, f64) {
            let lon = self.lon0 + col as f64 * self.dlon;
            let lat = self.lat0 + row as f64 * self.dlat;
            let (hx, hy) = (self.dlon.abs() / 2.0, self.dlat.abs() / 2.0);
            (lon - hx, lat - hy, lon + hx, lat + hy)
        }
    }
}

/// GeoJSON region fixtures.
pub mod regions {
    use super::*;

    /// A Feature with a rectangular Polygon geometry and a `nazwa` name property.
    pub fn rect_feature(name: &str, lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"nazwa":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#,
            name = name,
            x0 = lon_min,
            y0 = lat_min,
            x1 = lon_max,
            y1 = lat_max,
        )
    }

    /// Wrap features in a FeatureCollection.
    pub fn feature_collection(features: &[String]) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    /// Three regions over `grid::SMALL`: west half, east half, and the single
    /// cell at row 1, col 1.
    pub fn small_grid_regions() -> String {
        let spec = grid::SMALL;
        let (x0, y0, x1, y1) = spec.cell_bounds(1, 1);
        feature_collection(&[
            rect_feature("zachodni", 9.5, 49.5, 12.5, 53.5),
            rect_feature("wschodni", 12.5, 49.5, 15.5, 53.5),
            rect_feature("komorka", x0, y0, x1, y1),
        ])
    }

    /// Write a FeatureCollection to `dir/regions.geojson`.
    pub fn write_regions(dir: &Path, geojson: &str) -> PathBuf {
        let path = dir.join("regions.geojson");
        std::fs::write(&path, geojson).expect("failed to write regions file");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_spec_axes() {
        assert_eq!(grid::SMALL.size(), 24);
        assert_eq!(grid::SMALL.lons(), vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        assert_eq!(grid::SMALL.lats(), vec![53.0, 52.0, 51.0, 50.0]);
    }

    #[test]
    fn test_cell_bounds_descending() {
        assert_eq!(grid::SMALL.cell_bounds(1, 1), (10.5, 51.5, 11.5, 52.5));
    }

    #[test]
    fn test_feature_collection_shape() {
        let json = regions::small_grid_regions();
        assert!(json.starts_with(r#"{"type":"FeatureCollection""#));
        assert_eq!(json.matches(r#""type":"Feature""#).count(), 3);
    }
}
