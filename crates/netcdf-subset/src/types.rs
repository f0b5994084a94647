//! Schema types for gridded datasets: dimensions, attributes, variable layouts.

use serde::{Deserialize, Serialize};

/// Numeric element types a variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DataType {
    /// Short lowercase name, as used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::I8 => "i8",
            DataType::U8 => "u8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute value, mirroring every numeric and text attribute kind of netCDF.
///
/// Kept type-exact so attributes round-trip verbatim through a subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Uchar(u8),
    Uchars(Vec<u8>),
    Schar(i8),
    Schars(Vec<i8>),
    Ushort(u16),
    Ushorts(Vec<u16>),
    Short(i16),
    Shorts(Vec<i16>),
    Uint(u32),
    Uints(Vec<u32>),
    Int(i32),
    Ints(Vec<i32>),
    Ulonglong(u64),
    Ulonglongs(Vec<u64>),
    Longlong(i64),
    Longlongs(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    Double(f64),
    Doubles(Vec<f64>),
    Str(String),
    Strs(Vec<String>),
}

impl AttrValue {
    /// Numeric value of a scalar attribute, or the first element of a vector one.
    ///
    /// Returns `None` for text attributes and empty vectors.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Uchar(v) => Some(*v as f64),
            AttrValue::Uchars(v) => v.first().map(|x| *x as f64),
            AttrValue::Schar(v) => Some(*v as f64),
            AttrValue::Schars(v) => v.first().map(|x| *x as f64),
            AttrValue::Ushort(v) => Some(*v as f64),
            AttrValue::Ushorts(v) => v.first().map(|x| *x as f64),
            AttrValue::Short(v) => Some(*v as f64),
            AttrValue::Shorts(v) => v.first().map(|x| *x as f64),
            AttrValue::Uint(v) => Some(*v as f64),
            AttrValue::Uints(v) => v.first().map(|x| *x as f64),
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Ints(v) => v.first().map(|x| *x as f64),
            AttrValue::Ulonglong(v) => Some(*v as f64),
            AttrValue::Ulonglongs(v) => v.first().map(|x| *x as f64),
            AttrValue::Longlong(v) => Some(*v as f64),
            AttrValue::Longlongs(v) => v.first().map(|x| *x as f64),
            AttrValue::Float(v) => Some(*v as f64),
            AttrValue::Floats(v) => v.first().map(|x| *x as f64),
            AttrValue::Double(v) => Some(*v),
            AttrValue::Doubles(v) => v.first().copied(),
            AttrValue::Str(_) | AttrValue::Strs(_) => None,
        }
    }

    /// Text content of a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Strs(v) => v.first().map(String::as_str),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Double(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i16> for AttrValue {
    fn from(v: i16) -> Self {
        AttrValue::Short(v)
    }
}

/// A named attribute on a dataset or variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up an attribute by name in an ordered attribute list.
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttrValue> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| &a.value)
}

/// A named dimension.
///
/// For unlimited dimensions `len` is the current extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

impl Dimension {
    /// A fixed-length dimension.
    pub fn fixed(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
            unlimited: false,
        }
    }

    /// An unlimited (record) dimension with its current extent.
    pub fn unlimited(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
            unlimited: true,
        }
    }
}

/// Layout of one variable: type, dimension tuple, current shape and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSchema {
    pub name: String,
    pub dtype: DataType,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub attributes: Vec<Attribute>,
}

impl VariableSchema {
    /// Axis position of a named dimension in this variable's tuple.
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Look up one of this variable's attributes.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        find_attribute(&self.attributes, name)
    }

    /// Number of elements described by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}
