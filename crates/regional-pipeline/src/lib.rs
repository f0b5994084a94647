//! Batch orchestration of the regional climate pipeline.
//!
//! Two stages, both driven by one [`PipelineConfig`]:
//!
//! - [`SubsetRunner`] restricts every archive file of every variable folder
//!   to the configured bounding box, writing into a prefixed folder per
//!   variable.
//! - [`AggregateRunner`] computes region means for every variable and year
//!   and writes one CSV table per variable.
//!
//! Missing inputs are skipped and per-file failures are recorded; both
//! stages return a [`RunSummary`] instead of stopping at the first error.

pub mod aggregate_runner;
pub mod config;
pub mod error;
pub mod layout;
pub mod outcome;
pub mod subset_runner;
pub mod table;

// Re-exports
pub use aggregate_runner::{AggregateRunner, AggregateUnit};
pub use config::{
    AggregateConfig, PathsConfig, PipelineConfig, SubsetConfig, YearMode, YearSpec, ARCHIVE_YEARS,
};
pub use error::{PipelineError, Result};
pub use layout::OutputLayout;
pub use outcome::{RunSummary, UnitFailure, UnitOutcome};
pub use subset_runner::SubsetRunner;
pub use table::{finalize, write_table, TableRow};
