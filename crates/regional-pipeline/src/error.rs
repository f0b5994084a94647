//! Error types for the regional pipeline crate.

use std::path::PathBuf;

use netcdf_subset::SubsetError;
use thiserror::Error;
use zonal_stats::ZonalError;

/// Errors that can occur while configuring or running a batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Subset(#[from] SubsetError),

    #[error(transparent)]
    Zonal(#[from] ZonalError),

    /// The run cannot continue: the output root cannot be created.
    #[error("Cannot create output root {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
