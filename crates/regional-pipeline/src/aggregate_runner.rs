//! Aggregation stage: region means for every variable and year, written as
//! one table per variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;
use zonal_stats::{AggregateRecord, RegionSet, ZonalAggregator};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::layout::{has_extension, table_file, year_of_stem, yearly_file};
use crate::outcome::{RunSummary, UnitOutcome};
use crate::table::{finalize, write_table};

/// One input file of one variable. `year` is `None` for a discovered file
/// whose name has no year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateUnit {
    pub variable: String,
    pub year: Option<i32>,
    pub path: PathBuf,
}

impl AggregateUnit {
    fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{}/{}", self.variable, year),
            None => format!("{}/{}", self.variable, self.path.display()),
        }
    }
}

pub struct AggregateRunner<'a> {
    config: &'a PipelineConfig,
    aggregator: ZonalAggregator,
}

impl<'a> AggregateRunner<'a> {
    pub fn new(config: &'a PipelineConfig, regions: Arc<RegionSet>) -> Self {
        Self {
            config,
            aggregator: ZonalAggregator::new(regions, config.aggregation_settings()),
        }
    }

    /// Load the configured region file and build a runner over it.
    pub fn from_config(config: &'a PipelineConfig) -> Result<Self> {
        let regions = RegionSet::load(&config.paths.regions_file, &config.aggregate.name_field)?;
        if regions.is_empty() {
            return Err(PipelineError::Config(format!(
                "no polygon regions in {}",
                config.paths.regions_file.display()
            )));
        }
        Ok(Self::new(config, Arc::new(regions)))
    }

    pub fn aggregator(&self) -> &ZonalAggregator {
        &self.aggregator
    }

    /// Aggregate every configured variable and write its table.
    ///
    /// Only a failure to create the table directory aborts.
    #[instrument(skip_all, fields(regions = self.aggregator.regions().len()))]
    pub fn run(&self) -> Result<RunSummary> {
        let out_dir = &self.config.paths.table_output_dir;
        fs::create_dir_all(out_dir).map_err(|source| PipelineError::OutputRoot {
            path: out_dir.clone(),
            source,
        })?;

        let mut summary = RunSummary::new("aggregate");
        for variable in &self.config.aggregate.variables {
            let (records, variable_summary) = self.aggregate_variable(variable);
            summary.merge(variable_summary);

            let rows = finalize(records, self.config.aggregate.decimals);
            let path = table_file(out_dir, variable);
            match write_table(&path, &rows, &self.config.aggregate.missing_marker) {
                Ok(()) => info!(
                    variable = %variable,
                    rows = rows.len(),
                    path = %path.display(),
                    "Wrote table"
                ),
                Err(e) => {
                    error!(
                        variable = %variable,
                        path = %path.display(),
                        error = %e,
                        "Failed to write table"
                    );
                    summary.record(path.display().to_string(), UnitOutcome::failed(e));
                }
            }
        }

        let stats = self.aggregator.mask_stats();
        info!(hits = stats.hits, misses = stats.misses, "Mask cache");
        summary.log();
        Ok(summary)
    }

    /// All records of one variable, ordered by year then region.
    pub fn aggregate_variable(&self, variable: &str) -> (Vec<AggregateRecord>, RunSummary) {
        let mut summary = RunSummary::new("aggregate");
        let units = match self.units(variable) {
            Ok(units) => units,
            Err(e) => {
                error!(variable = %variable, error = %e, "Failed to list input files");
                summary.record(variable, UnitOutcome::failed(e));
                return (Vec::new(), summary);
            }
        };

        let results: Vec<(AggregateUnit, UnitOutcome, Vec<AggregateRecord>)> =
            if self.config.parallel {
                units
                    .into_par_iter()
                    .map(|unit| {
                        let (outcome, records) = self.run_unit(&unit);
                        (unit, outcome, records)
                    })
                    .collect()
            } else {
                units
                    .into_iter()
                    .map(|unit| {
                        let (outcome, records) = self.run_unit(&unit);
                        (unit, outcome, records)
                    })
                    .collect()
            };

        let mut records = Vec::new();
        for (unit, outcome, unit_records) in results {
            summary.record(unit.label(), outcome);
            records.extend(unit_records);
        }
        // Stable: region order within a year is kept.
        records.sort_by_key(|r| r.year);
        (records, summary)
    }

    /// Aggregate one file.
    #[instrument(skip_all, fields(variable = %unit.variable, year = ?unit.year))]
    pub fn run_unit(&self, unit: &AggregateUnit) -> (UnitOutcome, Vec<AggregateRecord>) {
        if !unit.path.is_file() {
            info!(file = %unit.path.display(), "File not found, skipping this year");
            return (UnitOutcome::skipped("file not found"), Vec::new());
        }

        match self
            .aggregator
            .aggregate_file(&unit.path, &unit.variable, unit.year)
        {
            Ok(records) => {
                let undefined = records.iter().filter(|r| r.mean.is_none()).count();
                if undefined > 0 {
                    warn!(undefined, "Regions without defined grid cells");
                }
                info!(file = %unit.path.display(), regions = records.len(), "Aggregated");
                (UnitOutcome::Processed, records)
            }
            Err(e) => {
                error!(file = %unit.path.display(), error = %e, "Failed to aggregate file");
                (UnitOutcome::failed(e), Vec::new())
            }
        }
    }

    /// Input files of `variable`: from the configured years, or by scanning
    /// the input directory in discover mode.
    pub fn units(&self, variable: &str) -> Result<Vec<AggregateUnit>> {
        let dir = &self.config.paths.aggregate_input_dir;
        let ext = &self.config.aggregate.file_extension;

        if let Some(years) = self.config.aggregate.years.years() {
            return Ok(years
                .into_iter()
                .map(|year| AggregateUnit {
                    variable: variable.to_string(),
                    year: Some(year),
                    path: yearly_file(dir, variable, year, ext),
                })
                .collect());
        }

        let mut units = discover(dir, variable, ext)?;
        units.sort_by(|a, b| (a.year, &a.path).cmp(&(b.year, &b.path)));
        Ok(units)
    }
}

fn discover(dir: &Path, variable: &str, ext: &str) -> Result<Vec<AggregateUnit>> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Input directory not found");
        return Ok(Vec::new());
    }

    let extensions = [ext.to_string()];
    let mut units = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, &extensions) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(year) = year_of_stem(stem, variable) {
            units.push(AggregateUnit {
                variable: variable.to_string(),
                year,
                path: entry.into_path(),
            });
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{YearMode, YearSpec};
    use test_utils::fixtures::{grid, regions};
    use test_utils::ClimateFileBuilder;
    use zonal_stats::DEFAULT_NAME_FIELD;

    fn setup(root: &Path) -> (PipelineConfig, Arc<RegionSet>) {
        let mut config = PipelineConfig::default();
        config.paths.aggregate_input_dir = root.join("in");
        config.paths.table_output_dir = root.join("tables");
        config.aggregate.variables = vec!["tx".to_string()];
        config.aggregate.years = YearSpec::Range { start: 1990, end: 1991 };
        fs::create_dir_all(root.join("in")).unwrap();

        let regions =
            RegionSet::from_geojson_str(&regions::small_grid_regions(), DEFAULT_NAME_FIELD).unwrap();
        (config, Arc::new(regions))
    }

    #[test]
    fn test_units_from_year_range() {
        let dir = tempfile::tempdir().unwrap();
        let (config, regions) = setup(dir.path());
        let runner = AggregateRunner::new(&config, regions);
        let units = runner.units("tx").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].year, Some(1991));
        assert!(units[1].path.ends_with("in/tx_1991.nc"));
    }

    #[test]
    fn test_discover_years() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, regions) = setup(dir.path());
        config.aggregate.years = YearSpec::Mode(YearMode::Discover);
        let input = dir.path().join("in");
        for name in ["tx_1995.nc", "tx_1990.nc", "tx_mean.nc", "tn_1990.nc", "tx_1991.txt"] {
            fs::write(input.join(name), b"").unwrap();
        }

        let runner = AggregateRunner::new(&config, regions);
        let years: Vec<_> = runner.units("tx").unwrap().iter().map(|u| u.year).collect();
        assert_eq!(years, vec![None, Some(1990), Some(1995)]);
    }

    #[test]
    fn test_missing_year_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (config, regions) = setup(dir.path());
        ClimateFileBuilder::new("tx", grid::SMALL, 2)
            .write(&dir.path().join("in").join("tx_1991.nc"));

        let runner = AggregateRunner::new(&config, regions);
        let (records, summary) = runner.aggregate_variable("tx");
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.year == Some(1991)));
        assert_eq!((summary.processed, summary.skipped, summary.failed), (1, 1, 0));
    }

    #[test]
    fn test_corrupt_file_fails_only_its_year() {
        let dir = tempfile::tempdir().unwrap();
        let (config, regions) = setup(dir.path());
        fs::write(dir.path().join("in").join("tx_1990.nc"), b"garbage").unwrap();
        ClimateFileBuilder::new("tx", grid::SMALL, 2)
            .write(&dir.path().join("in").join("tx_1991.nc"));

        let runner = AggregateRunner::new(&config, regions);
        let (records, summary) = runner.aggregate_variable("tx");
        assert_eq!(records.len(), 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].unit, "tx/1990");
    }

    #[test]
    fn test_parallel_keeps_year_then_region_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, regions) = setup(dir.path());
        config.parallel = true;
        config.aggregate.years = YearSpec::Range { start: 1990, end: 1993 };
        for year in 1990..=1993 {
            ClimateFileBuilder::new("tx", grid::SMALL, 2)
                .write(&dir.path().join("in").join(format!("tx_{}.nc", year)));
        }

        let runner = AggregateRunner::new(&config, regions);
        let (records, _) = runner.aggregate_variable("tx");
        let keys: Vec<_> = records.iter().map(|r| (r.year, r.region.as_str())).collect();
        let mut expected = Vec::new();
        for year in 1990..=1993 {
            for region in ["zachodni", "wschodni", "komorka"] {
                expected.push((Some(year), region));
            }
        }
        assert_eq!(keys, expected);
    }
}
