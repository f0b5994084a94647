//! Error types for region loading, masking and zonal aggregation.

use std::path::PathBuf;

use netcdf_subset::SubsetError;
use region_common::CommonError;
use thiserror::Error;

/// Result type for zonal statistics operations.
pub type ZonalResult<T> = Result<T, ZonalError>;

/// Error types for zonal statistics.
#[derive(Error, Debug)]
pub enum ZonalError {
    /// Reading the gridded dataset failed
    #[error(transparent)]
    Subset(#[from] SubsetError),

    /// Grid layout the aggregator cannot work with
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Malformed region geometry
    #[error("Invalid geometry for region '{region}': {message}")]
    InvalidGeometry { region: String, message: String },

    /// Region file is readable but not a usable FeatureCollection
    #[error("Region file {path}: {message}")]
    RegionFile { path: PathBuf, message: String },

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CommonError> for ZonalError {
    fn from(e: CommonError) -> Self {
        ZonalError::InvalidGrid(e.to_string())
    }
}
