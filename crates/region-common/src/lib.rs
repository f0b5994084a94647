//! Common types shared across the regional climate pipeline crates.

pub mod bbox;
pub mod error;
pub mod grid;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{CommonError, CommonResult};
pub use grid::{GeoTransform, GridShape};
