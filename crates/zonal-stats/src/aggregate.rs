//! Region means of one variable-year.

use std::path::Path;
use std::sync::Arc;

use netcdf_subset::{DatasetSource, NetCdfSource, SpatialAxes, DEFAULT_BLOCK_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ZonalResult;
use crate::field::{masked_mean, temporal_mean};
use crate::mask::{MaskCache, MaskCacheStats};
use crate::regions::RegionSet;

/// Mean of one variable over one region for one year.
///
/// `mean` is `None` when the region covers no grid cell with a defined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub variable: String,
    pub region: String,
    pub year: Option<i32>,
    pub mean: Option<f64>,
}

/// How temporal means are turned into region statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Variables whose daily mean is scaled to an annual total.
    pub annualized: Vec<String>,
    pub days_per_year: f64,
    pub axes: SpatialAxes,
    /// Time steps read per block.
    pub block_len: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            annualized: vec!["pr".to_string()],
            days_per_year: 365.0,
            axes: SpatialAxes::default(),
            block_len: DEFAULT_BLOCK_LEN,
        }
    }
}

/// Computes region means against a fixed region set, caching masks across
/// files that share a grid.
pub struct ZonalAggregator {
    regions: Arc<RegionSet>,
    masks: MaskCache,
    settings: AggregationSettings,
}

impl ZonalAggregator {
    pub fn new(regions: Arc<RegionSet>, settings: AggregationSettings) -> Self {
        let capacity = (regions.len() * 4).max(16);
        Self {
            regions,
            masks: MaskCache::new(capacity),
            settings,
        }
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    pub fn mask_stats(&self) -> MaskCacheStats {
        self.masks.stats()
    }

    pub fn is_annualized(&self, variable: &str) -> bool {
        self.settings.annualized.iter().any(|v| v == variable)
    }

    /// Factor applied to the temporal mean before the spatial mean.
    pub fn scale_for(&self, variable: &str) -> f64 {
        if self.is_annualized(variable) {
            self.settings.days_per_year
        } else {
            1.0
        }
    }

    /// One record per region, in region order.
    #[instrument(skip(self, source), fields(regions = self.regions.len()))]
    pub fn aggregate<S>(
        &self,
        source: &S,
        variable: &str,
        year: Option<i32>,
    ) -> ZonalResult<Vec<AggregateRecord>>
    where
        S: DatasetSource + ?Sized,
    {
        let field = temporal_mean(source, variable, &self.settings.axes, self.settings.block_len)?;
        let scale = self.scale_for(variable);
        let values = if scale == 1.0 {
            field.values
        } else {
            field.values.mapv(|v| v * scale)
        };
        let extent = field.transform.map(|t| t.bounds(field.shape));
        if field.transform.is_none() {
            warn!(
                variable = %variable,
                rows = field.shape.rows,
                cols = field.shape.cols,
                "Grid has no cells, every region mean is undefined"
            );
        }

        let records = self
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| {
                let mean = match (&field.transform, &extent) {
                    (Some(transform), Some(extent)) if region.bounds.intersects(extent) => {
                        let mask =
                            self.masks
                                .get_or_build(index, &region.geometry, transform, field.shape);
                        masked_mean(&values, &mask)
                    }
                    _ => None,
                };
                if mean.is_none() {
                    debug!(region = %region.name, "Region covers no defined cells");
                }
                AggregateRecord {
                    variable: variable.to_string(),
                    region: region.name.clone(),
                    year,
                    mean,
                }
            })
            .collect();

        Ok(records)
    }

    /// Open a NetCDF file and aggregate `variable` from it.
    pub fn aggregate_file(
        &self,
        path: &Path,
        variable: &str,
        year: Option<i32>,
    ) -> ZonalResult<Vec<AggregateRecord>> {
        let source = NetCdfSource::open(path)?;
        self.aggregate(&source, variable, year)
    }
}
