//! Dimension-aware bounding-box subsetting.
//!
//! A [`Subsetter`] copies every dimension, variable and attribute of a source
//! dataset into a sink, shrinking the longitude and latitude dimensions to the
//! positions whose coordinate falls inside the bounding box. Variables are
//! streamed along one non-spatial axis in fixed-size blocks so memory stays
//! bounded by the block, not by the length of the time axis.

use std::ops::Range;
use std::path::Path;

use region_common::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::dataset::{DatasetSink, DatasetSource};
use crate::error::{SubsetError, SubsetResult};
use crate::native::{NetCdfSink, NetCdfSource};
use crate::types::{Dimension, VariableSchema};

/// Default number of elements per streamed block along the chunk axis.
pub const DEFAULT_BLOCK_LEN: usize = 100;

/// Names of the longitude and latitude dimensions and coordinate variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialAxes {
    pub lon: String,
    pub lat: String,
}

impl SpatialAxes {
    pub fn new(lon: impl Into<String>, lat: impl Into<String>) -> Self {
        Self {
            lon: lon.into(),
            lat: lat.into(),
        }
    }
}

impl Default for SpatialAxes {
    fn default() -> Self {
        Self::new("lon", "lat")
    }
}

/// Positions along the longitude and latitude axes whose coordinate lies
/// inside a bounding box (inclusive), in ascending order.
///
/// Either list may be empty; that is a degenerate result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpatialIndexSet {
    pub lon: Vec<usize>,
    pub lat: Vec<usize>,
}

impl SpatialIndexSet {
    /// Select positions from 1-D coordinate vectors.
    pub fn from_coordinates(lon: &[f64], lat: &[f64], bbox: &BoundingBox) -> Self {
        Self {
            lon: positions(lon, |v| bbox.contains_lon(v)),
            lat: positions(lat, |v| bbox.contains_lat(v)),
        }
    }

    /// Read the coordinate variables of `source` and select positions.
    pub fn compute<S>(source: &S, axes: &SpatialAxes, bbox: &BoundingBox) -> SubsetResult<Self>
    where
        S: DatasetSource + ?Sized,
    {
        let lon = read_coordinate(source, &axes.lon)?;
        let lat = read_coordinate(source, &axes.lat)?;
        Ok(Self::from_coordinates(&lon, &lat, bbox))
    }

    /// True when either axis selected nothing.
    pub fn is_degenerate(&self) -> bool {
        self.lon.is_empty() || self.lat.is_empty()
    }

    fn for_role(&self, role: AxisRole) -> Option<&[usize]> {
        match role {
            AxisRole::Longitude => Some(&self.lon),
            AxisRole::Latitude => Some(&self.lat),
            AxisRole::Other => None,
        }
    }
}

fn positions(values: &[f64], keep: impl Fn(f64) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| keep(**v))
        .map(|(i, _)| i)
        .collect()
}

fn read_coordinate<S>(source: &S, name: &str) -> SubsetResult<Vec<f64>>
where
    S: DatasetSource + ?Sized,
{
    let schema = source.variable(name)?;
    if schema.dims.len() != 1 {
        return Err(SubsetError::ShapeMismatch {
            variable: name.to_string(),
            expected: vec![schema.element_count()],
            actual: schema.shape,
        });
    }
    Ok(source.read_all(name)?.to_f64().iter().copied().collect())
}

/// What an axis of a variable represents, relative to the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    Longitude,
    Latitude,
    Other,
}

/// How the streamed axis of each variable is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkAxisRule {
    /// First non-spatial axis in declaration order.
    #[default]
    FirstNonSpatial,
    /// The named dimension when the variable has it, else the first non-spatial axis.
    Named(String),
}

/// Chunk axis selection plus block length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    #[serde(default)]
    pub axis_rule: ChunkAxisRule,
    #[serde(default = "default_block_len")]
    pub block_len: usize,
}

fn default_block_len() -> usize {
    DEFAULT_BLOCK_LEN
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            axis_rule: ChunkAxisRule::FirstNonSpatial,
            block_len: DEFAULT_BLOCK_LEN,
        }
    }
}

impl ChunkPolicy {
    pub fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Axis to stream for a variable with these dims and roles, if any.
    pub fn chunk_axis(&self, dims: &[String], roles: &[AxisRole]) -> Option<usize> {
        let first_other = roles.iter().position(|r| *r == AxisRole::Other);
        match &self.axis_rule {
            ChunkAxisRule::FirstNonSpatial => first_other,
            ChunkAxisRule::Named(name) => dims
                .iter()
                .zip(roles)
                .position(|(d, r)| d == name && *r == AxisRole::Other)
                .or(first_other),
        }
    }
}

/// Per-variable copy plan, computed once before any data moves.
#[derive(Debug, Clone)]
pub struct VariablePlan {
    pub schema: VariableSchema,
    pub roles: Vec<AxisRole>,
    pub chunk_axis: Option<usize>,
    pub output_shape: Vec<usize>,
}

impl VariablePlan {
    pub fn new(
        schema: VariableSchema,
        axes: &SpatialAxes,
        indices: &SpatialIndexSet,
        policy: &ChunkPolicy,
    ) -> Self {
        let roles: Vec<AxisRole> = schema
            .dims
            .iter()
            .map(|d| {
                if *d == axes.lon {
                    AxisRole::Longitude
                } else if *d == axes.lat {
                    AxisRole::Latitude
                } else {
                    AxisRole::Other
                }
            })
            .collect();

        let output_shape = schema
            .shape
            .iter()
            .zip(&roles)
            .map(|(&n, &role)| indices.for_role(role).map_or(n, <[usize]>::len))
            .collect();

        let chunk_axis = policy.chunk_axis(&schema.dims, &roles);

        Self {
            schema,
            roles,
            chunk_axis,
            output_shape,
        }
    }

    /// Whether any axis of the variable is longitude or latitude.
    pub fn is_spatial(&self) -> bool {
        self.roles.iter().any(|r| *r != AxisRole::Other)
    }

    fn output_schema(&self) -> VariableSchema {
        VariableSchema {
            shape: self.output_shape.clone(),
            ..self.schema.clone()
        }
    }
}

/// Outcome of one subsetting operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubsetReport {
    pub lon_count: usize,
    pub lat_count: usize,
    pub variables_written: usize,
    pub blocks_written: usize,
}

impl SubsetReport {
    pub fn is_degenerate(&self) -> bool {
        self.lon_count == 0 || self.lat_count == 0
    }
}

/// Bounding-box subsetter.
#[derive(Debug, Clone)]
pub struct Subsetter {
    bbox: BoundingBox,
    axes: SpatialAxes,
    policy: ChunkPolicy,
}

impl Subsetter {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            axes: SpatialAxes::default(),
            policy: ChunkPolicy::default(),
        }
    }

    pub fn with_axes(mut self, axes: SpatialAxes) -> Self {
        self.axes = axes;
        self
    }

    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Copy `source` into `sink`, restricted to the bounding box.
    #[instrument(skip_all, fields(bbox = %self.bbox))]
    pub fn subset<S, D>(&self, source: &S, sink: &mut D) -> SubsetResult<SubsetReport>
    where
        S: DatasetSource + ?Sized,
        D: DatasetSink + ?Sized,
    {
        let indices = SpatialIndexSet::compute(source, &self.axes, &self.bbox)?;
        if indices.is_degenerate() {
            warn!(
                lon_count = indices.lon.len(),
                lat_count = indices.lat.len(),
                "Bounding box selects no grid points on at least one axis; output will be empty"
            );
        }

        for attr in source.global_attributes()? {
            sink.add_global_attribute(&attr)?;
        }

        for dim in source.dimensions()? {
            let len = if dim.name == self.axes.lon {
                indices.lon.len()
            } else if dim.name == self.axes.lat {
                indices.lat.len()
            } else {
                dim.len
            };
            sink.add_dimension(&Dimension { len, ..dim })?;
        }

        let plans: Vec<VariablePlan> = source
            .variables()?
            .into_iter()
            .map(|schema| VariablePlan::new(schema, &self.axes, &indices, &self.policy))
            .collect();

        // Define everything before writing; netCDF-4 files leave define mode
        // on the first data write.
        for plan in &plans {
            sink.add_variable(&plan.output_schema())?;
        }

        let mut blocks_written = 0;
        for plan in &plans {
            let blocks = self.copy_variable(source, sink, plan, &indices)?;
            debug!(
                variable = %plan.schema.name,
                spatial = plan.is_spatial(),
                chunk_axis = ?plan.chunk_axis,
                blocks,
                "Copied variable"
            );
            blocks_written += blocks;
        }

        Ok(SubsetReport {
            lon_count: indices.lon.len(),
            lat_count: indices.lat.len(),
            variables_written: plans.len(),
            blocks_written,
        })
    }

    /// Subset one NetCDF file into a new file, overwriting `output`.
    ///
    /// A partially written output is removed when the copy fails.
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn subset_file(&self, input: &Path, output: &Path) -> SubsetResult<SubsetReport> {
        let source = NetCdfSource::open(input)?;

        let result = NetCdfSink::create(output).and_then(|mut sink| self.subset(&source, &mut sink));

        match result {
            Ok(report) => {
                info!(
                    lon_count = report.lon_count,
                    lat_count = report.lat_count,
                    variables = report.variables_written,
                    "Subset written"
                );
                Ok(report)
            }
            Err(e) => {
                let _ = std::fs::remove_file(output);
                Err(e)
            }
        }
    }

    fn copy_variable<S, D>(
        &self,
        source: &S,
        sink: &mut D,
        plan: &VariablePlan,
        indices: &SpatialIndexSet,
    ) -> SubsetResult<usize>
    where
        S: DatasetSource + ?Sized,
        D: DatasetSink + ?Sized,
    {
        if plan.output_shape.iter().any(|&n| n == 0) {
            return Ok(0);
        }

        let Some(axis) = plan.chunk_axis else {
            copy_block(source, sink, plan, indices, None)?;
            return Ok(1);
        };

        let len = plan.schema.shape[axis];
        let step = self.policy.block_len.max(1);
        let mut blocks = 0;
        let mut start = 0;
        while start < len {
            let end = (start + step).min(len);
            copy_block(source, sink, plan, indices, Some((axis, start..end)))?;
            blocks += 1;
            start = end;
        }
        Ok(blocks)
    }
}

/// Read one block of a variable, gather the selected spatial positions and
/// write it at the matching place in the sink.
fn copy_block<S, D>(
    source: &S,
    sink: &mut D,
    plan: &VariablePlan,
    indices: &SpatialIndexSet,
    chunk: Option<(usize, Range<usize>)>,
) -> SubsetResult<()>
where
    S: DatasetSource + ?Sized,
    D: DatasetSink + ?Sized,
{
    let name = &plan.schema.name;
    let mut read: Vec<Range<usize>> = Vec::with_capacity(plan.roles.len());
    let mut write: Vec<Range<usize>> = Vec::with_capacity(plan.roles.len());
    let mut gathers: Vec<(usize, Vec<usize>)> = Vec::new();

    for (axis, (&role, &len)) in plan.roles.iter().zip(&plan.schema.shape).enumerate() {
        if let Some(selected) = indices.for_role(role) {
            // Non-empty: empty selections never reach here.
            let first = selected[0];
            let last = selected[selected.len() - 1];
            read.push(first..last + 1);
            write.push(0..selected.len());
            if last - first + 1 != selected.len() {
                gathers.push((axis, selected.iter().map(|i| i - first).collect()));
            }
        } else {
            match &chunk {
                Some((chunk_axis, range)) if *chunk_axis == axis => {
                    read.push(range.clone());
                    write.push(range.clone());
                }
                _ => {
                    read.push(0..len);
                    write.push(0..len);
                }
            }
        }
    }

    let mut block = source.read_block(name, &read)?;
    for (axis, offsets) in &gathers {
        block = block.select(*axis, offsets);
    }
    sink.write_block(name, &write, &block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{GriddedDataset, Variable};
    use crate::types::AttrValue;
    use ndarray::{Array1, ArrayD, IxDyn};

    /// time(unlimited 5) x lat(4) x lon(5); tx = t*100 + row*10 + col.
    fn fixture(lon: Vec<f64>) -> GriddedDataset {
        let nlon = lon.len();
        let tx: Vec<f32> = (0..5)
            .flat_map(|t| {
                (0..4).flat_map(move |r| (0..nlon).map(move |c| (t * 100 + r * 10 + c) as f32))
            })
            .collect();

        GriddedDataset::new()
            .with_dimension(Dimension::unlimited("time", 5))
            .with_dimension(Dimension::fixed("lat", 4))
            .with_dimension(Dimension::fixed("lon", nlon))
            .with_global_attribute("Conventions", "CF-1.6")
            .with_variable(
                Variable::new("time", &["time"], Array1::from(vec![0.0f64, 1.0, 2.0, 3.0, 4.0]).into_dyn())
                    .with_attribute("units", "days since 1950-01-01"),
            )
            .with_variable(
                Variable::new("lat", &["lat"], Array1::from(vec![50.0f64, 51.0, 52.0, 53.0]).into_dyn())
                    .with_attribute("units", "degrees_north"),
            )
            .with_variable(
                Variable::new("lon", &["lon"], Array1::from(lon).into_dyn())
                    .with_attribute("units", "degrees_east"),
            )
            .with_variable(
                Variable::new(
                    "tx",
                    &["time", "lat", "lon"],
                    ArrayD::from_shape_vec(IxDyn(&[5, 4, nlon]), tx).unwrap(),
                )
                .with_attribute("_FillValue", AttrValue::Float(-9999.0)),
            )
            .with_variable(Variable::new("crs", &[], ArrayD::from_elem(IxDyn(&[]), 4326i32)))
    }

    fn regular() -> GriddedDataset {
        fixture(vec![10.0, 11.0, 12.0, 13.0, 14.0])
    }

    fn run(subsetter: &Subsetter, src: &GriddedDataset) -> (GriddedDataset, SubsetReport) {
        let mut dst = GriddedDataset::new();
        let report = subsetter.subset(src, &mut dst).unwrap();
        dst.validate().unwrap();
        (dst, report)
    }

    fn values(ds: &GriddedDataset, name: &str) -> Vec<f64> {
        ds.get_variable(name).unwrap().values.to_f64().iter().copied().collect()
    }

    #[test]
    fn test_coordinates_within_bbox() {
        let bbox = BoundingBox::new(11.0, 13.0, 51.0, 52.0).unwrap();
        let (out, report) = run(&Subsetter::new(bbox), &regular());

        assert_eq!(report.lon_count, 3);
        assert_eq!(report.lat_count, 2);
        assert_eq!(values(&out, "lon"), vec![11.0, 12.0, 13.0]);
        assert_eq!(values(&out, "lat"), vec![51.0, 52.0]);
        assert_eq!(out.dimension("lon").unwrap().len, 3);

        let tx = out.get_variable("tx").unwrap();
        assert_eq!(tx.values.shape(), &[5, 2, 3]);
        // t=2, row 1 (lat 51), col 1 (lon 11)
        assert_eq!(tx.values.to_f64()[[2, 0, 0]], 211.0);
        assert_eq!(tx.values.to_f64()[[4, 1, 2]], 423.0);
    }

    #[test]
    fn test_non_spatial_variables_identical() {
        let src = regular();
        let bbox = BoundingBox::new(11.0, 13.0, 51.0, 52.0).unwrap();
        let (out, _) = run(&Subsetter::new(bbox), &src);

        assert_eq!(out.get_variable("time"), src.get_variable("time"));
        assert_eq!(out.get_variable("crs"), src.get_variable("crs"));
        let time_dim = out.dimension("time").unwrap();
        assert!(time_dim.unlimited);
        assert_eq!(time_dim.len, 5);
    }

    #[test]
    fn test_attributes_copied_verbatim() {
        let bbox = BoundingBox::new(11.0, 13.0, 51.0, 52.0).unwrap();
        let (out, _) = run(&Subsetter::new(bbox), &regular());

        assert_eq!(out.global_attribute("Conventions"), Some(&AttrValue::from("CF-1.6")));
        let lon = out.get_variable("lon").unwrap();
        assert_eq!(lon.attributes, vec![crate::types::Attribute::new("units", "degrees_east")]);
        let tx = out.get_variable("tx").unwrap();
        assert_eq!(tx.attributes[0].value, AttrValue::Float(-9999.0));
        assert_eq!(tx.dtype(), crate::types::DataType::F32);
    }

    #[test]
    fn test_box_between_samples_is_degenerate_not_error() {
        let bbox = BoundingBox::new(10.2, 10.4, 51.2, 51.4).unwrap();
        let (out, report) = run(&Subsetter::new(bbox), &regular());

        assert!(report.is_degenerate());
        assert_eq!(out.dimension("lon").unwrap().len, 0);
        assert_eq!(out.dimension("lat").unwrap().len, 0);
        assert_eq!(out.get_variable("tx").unwrap().values.shape(), &[5, 0, 0]);
        assert_eq!(values(&out, "time").len(), 5);
    }

    #[test]
    fn test_idempotent() {
        let subsetter = Subsetter::new(BoundingBox::new(10.5, 12.5, 50.0, 52.5).unwrap());
        let (a, _) = run(&subsetter, &regular());
        let (b, _) = run(&subsetter, &regular());
        assert_eq!(a, b);
    }

    #[test]
    fn test_block_length_does_not_change_output() {
        let bbox = BoundingBox::new(10.5, 12.5, 50.0, 52.5).unwrap();
        let one = Subsetter::new(bbox).with_policy(ChunkPolicy::default().with_block_len(1));
        let two = Subsetter::new(bbox).with_policy(ChunkPolicy::default().with_block_len(2));
        let big = Subsetter::new(bbox);

        let (a, ra) = run(&one, &regular());
        let (b, rb) = run(&two, &regular());
        let (c, rc) = run(&big, &regular());
        assert_eq!(a, c);
        assert_eq!(b, c);

        // tx and time stream 5 blocks each at len 1; lat, lon and crs are single passes.
        assert_eq!(ra.blocks_written, 5 + 5 + 3);
        assert_eq!(rb.blocks_written, 3 + 3 + 3);
        assert_eq!(rc.blocks_written, 1 + 1 + 3);
    }

    #[test]
    fn test_irregular_longitudes_gathered() {
        // Out-of-order sample in the middle of the axis.
        let src = fixture(vec![10.0, 11.0, 30.0, 12.0, 14.0]);
        let bbox = BoundingBox::new(10.0, 12.0, 50.0, 50.0).unwrap();
        let (out, report) = run(&Subsetter::new(bbox), &src);

        assert_eq!(report.lon_count, 3);
        assert_eq!(values(&out, "lon"), vec![10.0, 11.0, 12.0]);
        let tx = out.get_variable("tx").unwrap().values.to_f64();
        assert_eq!(tx.shape(), &[5, 1, 3]);
        assert_eq!(tx[[1, 0, 2]], 103.0);
    }

    #[test]
    fn test_named_chunk_axis() {
        let policy = ChunkPolicy {
            axis_rule: ChunkAxisRule::Named("time".into()),
            block_len: 2,
        };
        let dims: Vec<String> = vec!["lat".into(), "time".into(), "lon".into()];
        let roles = [AxisRole::Latitude, AxisRole::Other, AxisRole::Longitude];
        assert_eq!(policy.chunk_axis(&dims, &roles), Some(1));

        let fallback = ChunkPolicy {
            axis_rule: ChunkAxisRule::Named("level".into()),
            block_len: 2,
        };
        assert_eq!(fallback.chunk_axis(&dims, &roles), Some(1));
        assert_eq!(
            ChunkPolicy::default().chunk_axis(&dims[..1], &roles[..1]),
            None
        );
    }

    #[test]
    fn test_missing_coordinate_is_error() {
        let src = GriddedDataset::new().with_dimension(Dimension::fixed("x", 2));
        let err = Subsetter::new(BoundingBox::POLAND)
            .subset(&src, &mut GriddedDataset::new())
            .unwrap_err();
        assert!(matches!(err, SubsetError::MissingVariable(ref v) if v == "lon"));
    }
}
