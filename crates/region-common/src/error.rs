//! Error types shared by the pipeline crates.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the shared geometry types.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid grid axis '{axis}': {message}")]
    InvalidAxis { axis: String, message: String },
}
