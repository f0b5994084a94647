//! Dimension-aware spatial subsetting of NetCDF gridded datasets.
//!
//! A gridded dataset is an ordered set of named dimensions, typed variables
//! laid out over those dimensions, and attributes. This crate reads such
//! datasets from NetCDF files (or builds them in memory), and copies them into
//! a new dataset restricted to a longitude/latitude bounding box.
//!
//! # Example
//!
//! ```no_run
//! use netcdf_subset::{Subsetter, ChunkPolicy};
//! use region_common::BoundingBox;
//! use std::path::Path;
//!
//! let subsetter = Subsetter::new(BoundingBox::POLAND)
//!     .with_policy(ChunkPolicy::default().with_block_len(100));
//! let report = subsetter
//!     .subset_file(Path::new("tx_1950.nc"), Path::new("tx_1950_poland.nc"))
//!     .unwrap();
//! println!("{} x {} grid points kept", report.lon_count, report.lat_count);
//! ```

pub mod dataset;
pub mod error;
pub mod native;
pub mod subset;
pub mod types;
pub mod values;

pub use dataset::{DatasetSink, DatasetSource, GriddedDataset, Variable};
pub use error::{SubsetError, SubsetResult};
pub use native::{silence_hdf5_errors, NetCdfSink, NetCdfSource};
pub use subset::{
    AxisRole, ChunkAxisRule, ChunkPolicy, SpatialAxes, SpatialIndexSet, SubsetReport, Subsetter,
    VariablePlan, DEFAULT_BLOCK_LEN,
};
pub use types::{find_attribute, AttrValue, Attribute, DataType, Dimension, VariableSchema};
pub use values::ArrayValues;
