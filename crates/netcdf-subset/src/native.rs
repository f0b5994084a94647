//! NetCDF file access using the native netcdf library.
//!
//! [`NetCdfSource`] and [`NetCdfSink`] expose files on disk through the
//! [`DatasetSource`]/[`DatasetSink`] traits. Values are read and written in
//! their declared element type; attributes are carried with their exact
//! netCDF type.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Once;

use ndarray::{ArrayD, IxDyn};
use netcdf::extent::{Extent, Extents};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::debug;

use crate::dataset::{DatasetSink, DatasetSource};
use crate::error::{SubsetError, SubsetResult};
use crate::types::{AttrValue, Attribute, DataType, Dimension, VariableSchema};
use crate::values::ArrayValues;

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 prints diagnostic stacks to stderr even for errors the netcdf library
/// handles itself (probing for attributes that don't exist, for example).
/// Disabled once per process; calling again is a no-op.
///
/// Call early in `main()`, before any file is opened.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with null handlers disables the automatic
        // error stack printing; this is a documented use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

// =============================================================================
// Reading
// =============================================================================

/// A NetCDF file opened for reading.
pub struct NetCdfSource {
    file: netcdf::File,
    path: PathBuf,
}

impl NetCdfSource {
    pub fn open(path: impl AsRef<Path>) -> SubsetResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let file = netcdf::open(path)
            .map_err(|e| SubsetError::Netcdf(format!("Failed to open {}: {}", path.display(), e)))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn nc_variable(&self, name: &str) -> SubsetResult<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| SubsetError::MissingVariable(name.to_string()))
    }
}

impl DatasetSource for NetCdfSource {
    fn dimensions(&self) -> SubsetResult<Vec<Dimension>> {
        Ok(self
            .file
            .dimensions()
            .map(|d| Dimension {
                name: d.name(),
                len: d.len(),
                unlimited: d.is_unlimited(),
            })
            .collect())
    }

    fn global_attributes(&self) -> SubsetResult<Vec<Attribute>> {
        read_attributes("global", self.file.attributes())
    }

    fn variables(&self) -> SubsetResult<Vec<VariableSchema>> {
        self.file.variables().map(|var| schema_of(&var)).collect()
    }

    fn variable(&self, name: &str) -> SubsetResult<VariableSchema> {
        schema_of(&self.nc_variable(name)?)
    }

    fn read_block(&self, variable: &str, extents: &[Range<usize>]) -> SubsetResult<ArrayValues> {
        let var = self.nc_variable(variable)?;
        let dtype = dtype_of(&var)?;
        let counts: Vec<usize> = extents.iter().map(|r| r.end.saturating_sub(r.start)).collect();

        if var.dimensions().len() != extents.len() {
            return Err(SubsetError::ShapeMismatch {
                variable: variable.to_string(),
                expected: var.dimensions().iter().map(|d| d.len()).collect(),
                actual: counts,
            });
        }
        if counts.iter().any(|&c| c == 0) {
            return Ok(ArrayValues::zeros(dtype, &counts));
        }

        macro_rules! read_as {
            ($t:ty) => {{
                let values: Vec<$t> = var.get_values(to_extents(extents))?;
                let arr = ArrayD::from_shape_vec(IxDyn(&counts), values).map_err(|_| {
                    SubsetError::ShapeMismatch {
                        variable: variable.to_string(),
                        expected: counts.clone(),
                        actual: vec![],
                    }
                })?;
                ArrayValues::from(arr)
            }};
        }

        Ok(match dtype {
            DataType::I8 => read_as!(i8),
            DataType::U8 => read_as!(u8),
            DataType::I16 => read_as!(i16),
            DataType::U16 => read_as!(u16),
            DataType::I32 => read_as!(i32),
            DataType::U32 => read_as!(u32),
            DataType::I64 => read_as!(i64),
            DataType::U64 => read_as!(u64),
            DataType::F32 => read_as!(f32),
            DataType::F64 => read_as!(f64),
        })
    }
}

fn schema_of(var: &netcdf::Variable<'_>) -> SubsetResult<VariableSchema> {
    let name = var.name();
    Ok(VariableSchema {
        dtype: dtype_of(var)?,
        dims: var.dimensions().iter().map(|d| d.name()).collect(),
        shape: var.dimensions().iter().map(|d| d.len()).collect(),
        attributes: read_attributes(&name, var.attributes())?,
        name,
    })
}

fn dtype_of(var: &netcdf::Variable<'_>) -> SubsetResult<DataType> {
    let unsupported = |kind: String| SubsetError::UnsupportedType {
        variable: var.name(),
        kind,
    };
    match var.vartype() {
        NcVariableType::Int(IntType::I8) => Ok(DataType::I8),
        NcVariableType::Int(IntType::U8) => Ok(DataType::U8),
        NcVariableType::Int(IntType::I16) => Ok(DataType::I16),
        NcVariableType::Int(IntType::U16) => Ok(DataType::U16),
        NcVariableType::Int(IntType::I32) => Ok(DataType::I32),
        NcVariableType::Int(IntType::U32) => Ok(DataType::U32),
        NcVariableType::Int(IntType::I64) => Ok(DataType::I64),
        NcVariableType::Int(IntType::U64) => Ok(DataType::U64),
        NcVariableType::Float(FloatType::F32) => Ok(DataType::F32),
        NcVariableType::Float(FloatType::F64) => Ok(DataType::F64),
        other => Err(unsupported(format!("{:?}", other))),
    }
}

fn read_attributes<'f>(
    owner: &str,
    attributes: impl Iterator<Item = netcdf::Attribute<'f>>,
) -> SubsetResult<Vec<Attribute>> {
    let mut out = Vec::new();
    for attr in attributes {
        let name = attr.name().to_string();
        match from_nc_attr(attr.value()?) {
            Some(value) => out.push(Attribute { name, value }),
            None => debug!(owner = %owner, attribute = %name, "Skipping attribute of unsupported type"),
        }
    }
    Ok(out)
}

// =============================================================================
// Writing
// =============================================================================

/// A NetCDF-4 file being written. The file is closed when the sink is dropped.
pub struct NetCdfSink {
    file: netcdf::FileMut,
    path: PathBuf,
}

impl NetCdfSink {
    /// Create (or truncate) a NetCDF-4 file.
    pub fn create(path: impl AsRef<Path>) -> SubsetResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let file = netcdf::create(path).map_err(|e| {
            SubsetError::Netcdf(format!("Failed to create {}: {}", path.display(), e))
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSink for NetCdfSink {
    fn add_dimension(&mut self, dimension: &Dimension) -> SubsetResult<()> {
        // libnetcdf treats a fixed length of 0 as NC_UNLIMITED.
        if dimension.unlimited || dimension.len == 0 {
            if !dimension.unlimited {
                debug!(dimension = %dimension.name, "Zero-length dimension written as unlimited");
            }
            self.file.add_unlimited_dimension(&dimension.name)?;
        } else {
            self.file.add_dimension(&dimension.name, dimension.len)?;
        }
        Ok(())
    }

    fn add_global_attribute(&mut self, attribute: &Attribute) -> SubsetResult<()> {
        self.file
            .add_attribute(&attribute.name, to_nc_attr(&attribute.value))?;
        Ok(())
    }

    fn add_variable(&mut self, schema: &VariableSchema) -> SubsetResult<()> {
        let dims: Vec<&str> = schema.dims.iter().map(String::as_str).collect();

        macro_rules! define_as {
            ($t:ty) => {{
                let mut var = self.file.add_variable::<$t>(&schema.name, &dims)?;
                for attr in &schema.attributes {
                    var.put_attribute(&attr.name, to_nc_attr(&attr.value))?;
                }
            }};
        }

        match schema.dtype {
            DataType::I8 => define_as!(i8),
            DataType::U8 => define_as!(u8),
            DataType::I16 => define_as!(i16),
            DataType::U16 => define_as!(u16),
            DataType::I32 => define_as!(i32),
            DataType::U32 => define_as!(u32),
            DataType::I64 => define_as!(i64),
            DataType::U64 => define_as!(u64),
            DataType::F32 => define_as!(f32),
            DataType::F64 => define_as!(f64),
        }
        Ok(())
    }

    fn write_block(
        &mut self,
        variable: &str,
        extents: &[Range<usize>],
        block: &ArrayValues,
    ) -> SubsetResult<()> {
        if block.is_empty() {
            return Ok(());
        }

        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| SubsetError::MissingVariable(variable.to_string()))?;

        macro_rules! write_as {
            ($arr:expr) => {{
                let data: Vec<_> = $arr.iter().copied().collect();
                var.put_values(&data, to_extents(extents))?;
            }};
        }

        match block {
            ArrayValues::I8(arr) => write_as!(arr),
            ArrayValues::U8(arr) => write_as!(arr),
            ArrayValues::I16(arr) => write_as!(arr),
            ArrayValues::U16(arr) => write_as!(arr),
            ArrayValues::I32(arr) => write_as!(arr),
            ArrayValues::U32(arr) => write_as!(arr),
            ArrayValues::I64(arr) => write_as!(arr),
            ArrayValues::U64(arr) => write_as!(arr),
            ArrayValues::F32(arr) => write_as!(arr),
            ArrayValues::F64(arr) => write_as!(arr),
        }
        Ok(())
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn to_extents(extents: &[Range<usize>]) -> Extents {
    if extents.is_empty() {
        return Extents::All;
    }
    Extents::Extent(
        extents
            .iter()
            .map(|r| Extent::SliceCount {
                start: r.start,
                count: r.end - r.start,
                stride: 1,
            })
            .collect(),
    )
}

fn from_nc_attr(value: AttributeValue) -> Option<AttrValue> {
    #[allow(unreachable_patterns)]
    let converted = match value {
        AttributeValue::Uchar(v) => AttrValue::Uchar(v),
        AttributeValue::Uchars(v) => AttrValue::Uchars(v),
        AttributeValue::Schar(v) => AttrValue::Schar(v),
        AttributeValue::Schars(v) => AttrValue::Schars(v),
        AttributeValue::Ushort(v) => AttrValue::Ushort(v),
        AttributeValue::Ushorts(v) => AttrValue::Ushorts(v),
        AttributeValue::Short(v) => AttrValue::Short(v),
        AttributeValue::Shorts(v) => AttrValue::Shorts(v),
        AttributeValue::Uint(v) => AttrValue::Uint(v),
        AttributeValue::Uints(v) => AttrValue::Uints(v),
        AttributeValue::Int(v) => AttrValue::Int(v),
        AttributeValue::Ints(v) => AttrValue::Ints(v),
        AttributeValue::Ulonglong(v) => AttrValue::Ulonglong(v),
        AttributeValue::Ulonglongs(v) => AttrValue::Ulonglongs(v),
        AttributeValue::Longlong(v) => AttrValue::Longlong(v),
        AttributeValue::Longlongs(v) => AttrValue::Longlongs(v),
        AttributeValue::Float(v) => AttrValue::Float(v),
        AttributeValue::Floats(v) => AttrValue::Floats(v),
        AttributeValue::Double(v) => AttrValue::Double(v),
        AttributeValue::Doubles(v) => AttrValue::Doubles(v),
        AttributeValue::Str(v) => AttrValue::Str(v),
        AttributeValue::Strs(v) => AttrValue::Strs(v),
        _ => return None,
    };
    Some(converted)
}

fn to_nc_attr(value: &AttrValue) -> AttributeValue {
    match value.clone() {
        AttrValue::Uchar(v) => AttributeValue::Uchar(v),
        AttrValue::Uchars(v) => AttributeValue::Uchars(v),
        AttrValue::Schar(v) => AttributeValue::Schar(v),
        AttrValue::Schars(v) => AttributeValue::Schars(v),
        AttrValue::Ushort(v) => AttributeValue::Ushort(v),
        AttrValue::Ushorts(v) => AttributeValue::Ushorts(v),
        AttrValue::Short(v) => AttributeValue::Short(v),
        AttrValue::Shorts(v) => AttributeValue::Shorts(v),
        AttrValue::Uint(v) => AttributeValue::Uint(v),
        AttrValue::Uints(v) => AttributeValue::Uints(v),
        AttrValue::Int(v) => AttributeValue::Int(v),
        AttrValue::Ints(v) => AttributeValue::Ints(v),
        AttrValue::Ulonglong(v) => AttributeValue::Ulonglong(v),
        AttrValue::Ulonglongs(v) => AttributeValue::Ulonglongs(v),
        AttrValue::Longlong(v) => AttributeValue::Longlong(v),
        AttrValue::Longlongs(v) => AttributeValue::Longlongs(v),
        AttrValue::Float(v) => AttributeValue::Float(v),
        AttrValue::Floats(v) => AttributeValue::Floats(v),
        AttrValue::Double(v) => AttributeValue::Double(v),
        AttrValue::Doubles(v) => AttributeValue::Doubles(v),
        AttrValue::Str(v) => AttributeValue::Str(v),
        AttrValue::Strs(v) => AttributeValue::Strs(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_extents_scalar_is_all() {
        assert!(matches!(to_extents(&[]), Extents::All));
    }

    #[test]
    fn test_attribute_conversion_keeps_type() {
        for value in [
            AttrValue::Short(-9999),
            AttrValue::Floats(vec![0.5, 1.5]),
            AttrValue::Str("degrees_east".into()),
            AttrValue::Ulonglong(7),
        ] {
            assert_eq!(from_nc_attr(to_nc_attr(&value)), Some(value));
        }
    }
}
