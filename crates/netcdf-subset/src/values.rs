//! Typed n-dimensional value arrays.
//!
//! `ArrayValues` keeps a variable's data in its declared element type so that
//! copying between datasets never widens or rounds values.

use std::ops::Range;

use ndarray::{ArrayD, Axis, IxDyn, Slice};

use crate::error::{SubsetError, SubsetResult};
use crate::types::DataType;

/// An n-dimensional array of one numeric element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    I8(ArrayD<i8>),
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Run an expression against the inner array, whatever its element type.
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayValues::I8($arr) => $body,
            ArrayValues::U8($arr) => $body,
            ArrayValues::I16($arr) => $body,
            ArrayValues::U16($arr) => $body,
            ArrayValues::I32($arr) => $body,
            ArrayValues::U32($arr) => $body,
            ArrayValues::I64($arr) => $body,
            ArrayValues::U64($arr) => $body,
            ArrayValues::F32($arr) => $body,
            ArrayValues::F64($arr) => $body,
        }
    };
}

/// Like `with_array!`, re-wrapping the resulting array in the same variant.
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayValues::I8($arr) => ArrayValues::I8($body),
            ArrayValues::U8($arr) => ArrayValues::U8($body),
            ArrayValues::I16($arr) => ArrayValues::I16($body),
            ArrayValues::U16($arr) => ArrayValues::U16($body),
            ArrayValues::I32($arr) => ArrayValues::I32($body),
            ArrayValues::U32($arr) => ArrayValues::U32($body),
            ArrayValues::I64($arr) => ArrayValues::I64($body),
            ArrayValues::U64($arr) => ArrayValues::U64($body),
            ArrayValues::F32($arr) => ArrayValues::F32($body),
            ArrayValues::F64($arr) => ArrayValues::F64($body),
        }
    };
}

macro_rules! impl_from_array {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$t>> for ArrayValues {
                fn from(arr: ArrayD<$t>) -> Self {
                    ArrayValues::$variant(arr)
                }
            }
        )*
    };
}

impl_from_array!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

fn to_slice(range: &Range<usize>) -> Slice {
    Slice::from(range.start..range.end)
}

impl ArrayValues {
    /// Zero-filled array of the given type and shape.
    pub fn zeros(dtype: DataType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            DataType::I8 => ArrayValues::I8(ArrayD::zeros(dim)),
            DataType::U8 => ArrayValues::U8(ArrayD::zeros(dim)),
            DataType::I16 => ArrayValues::I16(ArrayD::zeros(dim)),
            DataType::U16 => ArrayValues::U16(ArrayD::zeros(dim)),
            DataType::I32 => ArrayValues::I32(ArrayD::zeros(dim)),
            DataType::U32 => ArrayValues::U32(ArrayD::zeros(dim)),
            DataType::I64 => ArrayValues::I64(ArrayD::zeros(dim)),
            DataType::U64 => ArrayValues::U64(ArrayD::zeros(dim)),
            DataType::F32 => ArrayValues::F32(ArrayD::zeros(dim)),
            DataType::F64 => ArrayValues::F64(ArrayD::zeros(dim)),
        }
    }

    /// Element type of this array.
    pub fn dtype(&self) -> DataType {
        match self {
            ArrayValues::I8(_) => DataType::I8,
            ArrayValues::U8(_) => DataType::U8,
            ArrayValues::I16(_) => DataType::I16,
            ArrayValues::U16(_) => DataType::U16,
            ArrayValues::I32(_) => DataType::I32,
            ArrayValues::U32(_) => DataType::U32,
            ArrayValues::I64(_) => DataType::I64,
            ArrayValues::U64(_) => DataType::U64,
            ArrayValues::F32(_) => DataType::F32,
            ArrayValues::F64(_) => DataType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, arr => arr.shape())
    }

    pub fn len(&self) -> usize {
        with_array!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the hyperslab described by one range per axis.
    pub fn slice(&self, extents: &[Range<usize>]) -> SubsetResult<Self> {
        self.check_extents("slice", extents)?;
        Ok(map_array!(self, arr => arr
            .slice_each_axis(|ax| to_slice(&extents[ax.axis.index()]))
            .to_owned()))
    }

    /// Gather the given positions along one axis, in the order given.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Self {
        map_array!(self, arr => arr.select(Axis(axis), indices))
    }

    /// Overwrite the hyperslab described by `extents` with `block`.
    pub fn assign(&mut self, name: &str, extents: &[Range<usize>], block: &ArrayValues) -> SubsetResult<()> {
        self.check_extents(name, extents)?;

        let expected: Vec<usize> = extents.iter().map(|r| r.end - r.start).collect();
        if block.shape() != expected.as_slice() {
            return Err(SubsetError::ShapeMismatch {
                variable: name.to_string(),
                expected,
                actual: block.shape().to_vec(),
            });
        }

        macro_rules! assign_same {
            ($($variant:ident),*) => {
                match (&mut *self, block) {
                    $(
                        (ArrayValues::$variant(dst), ArrayValues::$variant(src)) => {
                            dst.slice_each_axis_mut(|ax| to_slice(&extents[ax.axis.index()]))
                                .assign(src);
                            Ok(())
                        }
                    )*
                    (dst, src) => Err(SubsetError::TypeMismatch {
                        variable: name.to_string(),
                        expected: dst.dtype().to_string(),
                        actual: src.dtype().to_string(),
                    }),
                }
            };
        }

        assign_same!(I8, U8, I16, U16, I32, U32, I64, U64, F32, F64)
    }

    /// Widen every element to f64 for numeric reductions.
    pub fn to_f64(&self) -> ArrayD<f64> {
        with_array!(self, arr => arr.mapv(|v| v as f64))
    }

    fn check_extents(&self, name: &str, extents: &[Range<usize>]) -> SubsetResult<()> {
        let shape = self.shape();
        let fits = extents.len() == shape.len()
            && extents
                .iter()
                .zip(shape)
                .all(|(r, &n)| r.start <= r.end && r.end <= n);
        if fits {
            Ok(())
        } else {
            Err(SubsetError::ShapeMismatch {
                variable: name.to_string(),
                expected: shape.to_vec(),
                actual: extents.iter().map(|r| r.end).collect(),
            })
        }
    }
}
