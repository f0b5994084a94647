//! Per-cell temporal means of a time-indexed grid variable.
//!
//! The time axis is read in blocks and folded into a running sum and count
//! per cell, so only one block is in memory at a time. Values are CF-decoded
//! on the way in: fill values become undefined and packed values are
//! unpacked with `scale_factor`/`add_offset`.

use ndarray::{Array2, Axis, Ix3, Zip};
use netcdf_subset::{DatasetSource, SpatialAxes, VariableSchema};
use region_common::{GeoTransform, GridShape};
use tracing::debug;

use crate::error::{ZonalError, ZonalResult};
use crate::mask::Mask;

/// CF packing and missing-value attributes of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CfDecoding {
    fill_values: Vec<f64>,
    scale: f64,
    offset: f64,
}

impl Default for CfDecoding {
    fn default() -> Self {
        Self {
            fill_values: Vec::new(),
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl CfDecoding {
    pub fn from_schema(schema: &VariableSchema) -> Self {
        let fill_values = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|name| schema.attribute(name).and_then(|v| v.as_f64()))
            .collect();
        Self {
            fill_values,
            scale: schema
                .attribute("scale_factor")
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0),
            offset: schema
                .attribute("add_offset")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
        }
    }

    /// Physical value of a raw sample, `None` when it is missing.
    pub fn decode(&self, raw: f64) -> Option<f64> {
        if raw.is_nan() || self.fill_values.contains(&raw) {
            return None;
        }
        Some(raw * self.scale + self.offset)
    }
}

/// Temporal mean of every cell plus the grid it lives on.
///
/// Cells with no defined sample hold NaN.
#[derive(Debug, Clone)]
pub struct MeanField {
    pub values: Array2<f64>,
    /// `None` when the grid has no cells.
    pub transform: Option<GeoTransform>,
    pub shape: GridShape,
    pub time_steps: usize,
}

/// Read `variable` from `source` and average it over time, cell by cell.
///
/// The variable must be `(time, lat, lon)` or `(lat, lon)` with the lat and
/// lon axes named as in `axes`.
pub fn temporal_mean<S>(
    source: &S,
    variable: &str,
    axes: &SpatialAxes,
    block_len: usize,
) -> ZonalResult<MeanField>
where
    S: DatasetSource + ?Sized,
{
    let schema = source.variable(variable)?;
    let ndim = schema.dims.len();
    if !(2..=3).contains(&ndim)
        || schema.dims[ndim - 2] != axes.lat
        || schema.dims[ndim - 1] != axes.lon
    {
        return Err(ZonalError::InvalidGrid(format!(
            "'{}' has dimensions {:?}; expected (time, {}, {}) or ({}, {})",
            variable, schema.dims, axes.lat, axes.lon, axes.lat, axes.lon
        )));
    }

    let lon: Vec<f64> = source.read_all(&axes.lon)?.to_f64().iter().copied().collect();
    let lat: Vec<f64> = source.read_all(&axes.lat)?.to_f64().iter().copied().collect();
    let shape = GridShape::new(schema.shape[ndim - 2], schema.shape[ndim - 1]);
    if lat.len() != shape.rows || lon.len() != shape.cols {
        return Err(ZonalError::InvalidGrid(format!(
            "coordinate lengths ({}, {}) do not match grid ({}, {})",
            lat.len(),
            lon.len(),
            shape.rows,
            shape.cols
        )));
    }
    let transform = if shape.is_empty() {
        None
    } else {
        Some(GeoTransform::from_coordinates(&lon, &lat)?)
    };

    let decoding = CfDecoding::from_schema(&schema);
    let mut sum = Array2::<f64>::zeros((shape.rows, shape.cols));
    let mut count = Array2::<u32>::zeros((shape.rows, shape.cols));

    let nt = if ndim == 3 { schema.shape[0] } else { 1 };
    let step = block_len.max(1);
    let mut start = 0;
    while start < nt && !shape.is_empty() {
        let end = (start + step).min(nt);
        let mut extents = vec![0..shape.rows, 0..shape.cols];
        if ndim == 3 {
            extents.insert(0, start..end);
        }

        let mut block = source.read_block(variable, &extents)?.to_f64();
        if ndim == 2 {
            block = block.insert_axis(Axis(0));
        }
        let block = block
            .into_dimensionality::<Ix3>()
            .map_err(|e| ZonalError::InvalidGrid(e.to_string()))?;

        for slice in block.axis_iter(Axis(0)) {
            Zip::from(&mut sum)
                .and(&mut count)
                .and(&slice)
                .for_each(|s, c, &raw| {
                    if let Some(v) = decoding.decode(raw) {
                        *s += v;
                        *c += 1;
                    }
                });
        }
        start = end;
    }

    let values = Zip::from(&sum)
        .and(&count)
        .map_collect(|&s, &c| if c > 0 { s / c as f64 } else { f64::NAN });

    debug!(
        variable = %variable,
        rows = shape.rows,
        cols = shape.cols,
        time_steps = nt,
        "Computed temporal mean"
    );

    Ok(MeanField {
        values,
        transform,
        shape,
        time_steps: if ndim == 3 { nt } else { 1 },
    })
}

/// Mean of the defined values under the mask; `None` when there are none.
pub fn masked_mean(field: &Array2<f64>, mask: &Mask) -> Option<f64> {
    let (sum, n) = Zip::from(field)
        .and(mask)
        .fold((0.0f64, 0usize), |(sum, n), &v, &inside| {
            if inside && v.is_finite() {
                (sum + v, n + 1)
            } else {
                (sum, n)
            }
        });
    (n > 0).then(|| sum / n as f64)
}
