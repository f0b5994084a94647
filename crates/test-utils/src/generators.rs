//! Test data generators for synthetic climate grids and NetCDF files.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use std::path::{Path, PathBuf};

use netcdf::extent::{Extent, Extents};

use crate::fixtures::grid::GridSpec;

/// Regularly spaced axis: `start, start + step, ...` with `n` samples.
pub fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// Creates a (time, lat, lon) cube with predictable values.
///
/// Each value is `t * 100 + row * 10 + col`, so any element can be checked
/// from its indices alone.
///
/// # Returns
///
/// A `Vec<f32>` in row-major order (time slowest, lon fastest).
///
/// # Example
///
/// ```
/// use test_utils::create_index_cube;
///
/// let cube = create_index_cube(2, 3, 4);
/// assert_eq!(cube.len(), 24);
/// assert_eq!(cube[0], 0.0);
/// assert_eq!(cube[4], 10.0);   // t=0, row=1, col=0
/// assert_eq!(cube[12], 100.0); // t=1, row=0, col=0
/// ```
pub fn create_index_cube(nt: usize, nlat: usize, nlon: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nt * nlat * nlon);
    for t in 0..nt {
        for row in 0..nlat {
            for col in 0..nlon {
                data.push((t * 100 + row * 10 + col) as f32);
            }
        }
    }
    data
}

/// Creates a cube where every element has the same value.
pub fn create_constant_cube(nt: usize, nlat: usize, nlon: usize, value: f32) -> Vec<f32> {
    vec![value; nt * nlat * nlon]
}

/// Builder for small EMO-style NetCDF files: `time` (unlimited), `lat`, `lon`
/// coordinates and one `(time, lat, lon)` f32 data variable.
///
/// # Example
///
/// ```ignore
/// let dir = tempfile::tempdir().unwrap();
/// let path = ClimateFileBuilder::new("tx", grid::SMALL, 3)
///     .with_constant(10.0)
///     .write(&dir.path().join("tx_1950.nc"));
/// ```
pub struct ClimateFileBuilder {
    variable: String,
    spec: GridSpec,
    nt: usize,
    data: Vec<f32>,
    fill_value: Option<f32>,
    units: String,
    time_units: String,
}

impl ClimateFileBuilder {
    /// Data defaults to [`create_index_cube`].
    pub fn new(variable: &str, spec: GridSpec, nt: usize) -> Self {
        Self {
            variable: variable.to_string(),
            spec,
            nt,
            data: create_index_cube(nt, spec.nlat, spec.nlon),
            fill_value: None,
            units: "degC".to_string(),
            time_units: "days since 1950-01-01 00:00:00".to_string(),
        }
    }

    pub fn with_constant(mut self, value: f32) -> Self {
        self.data = create_constant_cube(self.nt, self.spec.nlat, self.spec.nlon, value);
        self
    }

    /// Set one cell to `value` at every time step.
    pub fn with_cell_constant(mut self, row: usize, col: usize, value: f32) -> Self {
        let n_cells = self.spec.size();
        let cell = row * self.spec.nlon + col;
        for t in 0..self.nt {
            self.data[t * n_cells + cell] = value;
        }
        self
    }

    /// Set a single element.
    pub fn with_value(mut self, t: usize, row: usize, col: usize, value: f32) -> Self {
        let idx = t * self.spec.size() + row * self.spec.nlon + col;
        self.data[idx] = value;
        self
    }

    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = units.to_string();
        self
    }

    /// Write the fixture to `path` and return it.
    pub fn write(&self, path: &Path) -> PathBuf {
        let (nt, ny, nx) = (self.nt, self.spec.nlat, self.spec.nlon);
        let mut file = netcdf::create(path).expect("failed to create NetCDF file");

        file.add_attribute("Conventions", "CF-1.6")
            .expect("add Conventions");
        file.add_attribute("source", "test-utils fixture")
            .expect("add source");

        // Dimensions.
        file.add_unlimited_dimension("time").expect("add dim time");
        file.add_dimension("lat", ny).expect("add dim lat");
        file.add_dimension("lon", nx).expect("add dim lon");

        // Coordinate variables.
        {
            let mut var = file
                .add_variable::<f64>("lon", &["lon"])
                .expect("add var lon");
            var.put_attribute("units", "degrees_east").expect("lon units");
            var.put_attribute("standard_name", "longitude")
                .expect("lon standard_name");
            var.put_values(&self.spec.lons(), ..).expect("put lon values");
        }
        {
            let mut var = file
                .add_variable::<f64>("lat", &["lat"])
                .expect("add var lat");
            var.put_attribute("units", "degrees_north").expect("lat units");
            var.put_attribute("standard_name", "latitude")
                .expect("lat standard_name");
            var.put_values(&self.spec.lats(), ..).expect("put lat values");
        }

        // Time variable.
        if nt > 0 {
            let time_vals: Vec<f64> = (0..nt).map(|t| t as f64).collect();
            let mut var = file
                .add_variable::<f64>("time", &["time"])
                .expect("add var time");
            var.put_attribute("units", self.time_units.as_str())
                .expect("add time units");
            var.put_attribute("calendar", "proleptic_gregorian")
                .expect("add time calendar");
            var.put_values(&time_vals, slab(&[0..nt])).expect("put time values");
        }

        // Scalar grid-mapping variable.
        {
            let mut var = file
                .add_variable::<i32>("crs", &[])
                .expect("add var crs");
            var.put_attribute("grid_mapping_name", "latitude_longitude")
                .expect("add crs grid_mapping_name");
            var.put_values(&[4326i32], ..).expect("put crs value");
        }

        // Data variable.
        {
            let mut var = file
                .add_variable::<f32>(&self.variable, &["time", "lat", "lon"])
                .expect("add data var");
            if let Some(fv) = self.fill_value {
                var.put_attribute("_FillValue", fv).expect("add _FillValue");
            }
            var.put_attribute("units", self.units.as_str())
                .expect("add data units");
            if nt > 0 {
                var.put_values(&self.data, slab(&[0..nt, 0..ny, 0..nx]))
                    .expect("put data values");
            }
        }

        path.to_path_buf()
    }
}

fn slab(ranges: &[std::ops::Range<usize>]) -> Extents {
    Extents::Extent(
        ranges
            .iter()
            .map(|r| Extent::SliceCount {
                start: r.start,
                count: r.end - r.start,
                stride: 1,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grid;

    #[test]
    fn test_regular_axis() {
        assert_eq!(regular_axis(53.0, -1.0, 3), vec![53.0, 52.0, 51.0]);
        assert!(regular_axis(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_index_cube_layout() {
        let cube = create_index_cube(2, 3, 4);
        assert_eq!(cube[2 * 12 - 1], 123.0);
    }

    #[test]
    fn test_cell_constant() {
        let b = ClimateFileBuilder::new("tx", grid::SMALL, 2).with_cell_constant(1, 2, 7.0);
        assert_eq!(b.data[8], 7.0);
        assert_eq!(b.data[24 + 8], 7.0);
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = ClimateFileBuilder::new("pr", grid::SMALL, 3)
            .with_fill_value(-9999.0)
            .write(&dir.path().join("pr_1950.nc"));
        let file = netcdf::open(&path).unwrap();
        assert_eq!(file.dimension("time").unwrap().len(), 3);
        assert!(file.variable("pr").is_some());
    }
}
