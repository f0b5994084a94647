//! Error types for dataset reading, writing and subsetting.

use thiserror::Error;

/// Result type for subsetting operations.
pub type SubsetResult<T> = Result<T, SubsetError>;

/// Error types for dataset access and subsetting.
#[derive(Error, Debug)]
pub enum SubsetError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the NetCDF library
    #[error("NetCDF error: {0}")]
    Netcdf(String),

    /// Missing required variable
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// Missing required dimension
    #[error("Missing dimension: {0}")]
    MissingDimension(String),

    /// A variable references a dimension that was never declared
    #[error("Variable '{variable}' references undeclared dimension '{dimension}'")]
    UndeclaredDimension { variable: String, dimension: String },

    /// Block or array shape does not match the declared shape
    #[error("Shape mismatch for '{variable}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Block data type differs from the variable's declared type
    #[error("Type mismatch for '{variable}': expected {expected}, got {actual}")]
    TypeMismatch {
        variable: String,
        expected: String,
        actual: String,
    },

    /// Variable type the subsetter cannot copy (char, string, compound, ...)
    #[error("Unsupported data type for '{variable}': {kind}")]
    UnsupportedType { variable: String, kind: String },
}

impl From<netcdf::Error> for SubsetError {
    fn from(e: netcdf::Error) -> Self {
        SubsetError::Netcdf(e.to_string())
    }
}
