//! Zonal statistics of daily climate grids over administrative regions.
//!
//! For one variable-year file the pipeline is:
//!
//! 1. average every grid cell over the time axis, skipping missing values;
//! 2. scale annualized variables (precipitation) from a daily mean to a total;
//! 3. average the cells whose centre falls inside each region.
//!
//! Region masks depend only on the region and the grid, so they are cached
//! and reused across years.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use zonal_stats::{AggregationSettings, RegionSet, ZonalAggregator, DEFAULT_NAME_FIELD};
//!
//! let regions = RegionSet::load(Path::new("wojewodztwa.geojson"), DEFAULT_NAME_FIELD).unwrap();
//! let aggregator = ZonalAggregator::new(Arc::new(regions), AggregationSettings::default());
//! for record in aggregator
//!     .aggregate_file(Path::new("pr_1990_poland.nc"), "pr", Some(1990))
//!     .unwrap()
//! {
//!     println!("{}: {:?}", record.region, record.mean);
//! }
//! ```

pub mod aggregate;
pub mod error;
pub mod field;
pub mod geometry;
pub mod mask;
pub mod regions;

pub use aggregate::{AggregateRecord, AggregationSettings, ZonalAggregator};
pub use error::{ZonalError, ZonalResult};
pub use field::{masked_mean, temporal_mean, CfDecoding, MeanField};
pub use geometry::{Geometry, Location, Polygon, Ring};
pub use mask::{build_mask, mask_count, Mask, MaskCache, MaskCacheStats};
pub use regions::{Region, RegionSet, DEFAULT_NAME_FIELD};
