//! Pipeline configuration.
//!
//! Loaded from YAML with `${VAR}` and `${VAR:-default}` environment
//! substitution. Every field has a default, so a config file only needs the
//! keys it changes. The configuration is built once at start-up and passed
//! by reference to the runners.

use std::fs;
use std::path::{Path, PathBuf};

use netcdf_subset::{ChunkAxisRule, ChunkPolicy, SpatialAxes};
use region_common::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zonal_stats::{AggregationSettings, DEFAULT_NAME_FIELD};

use crate::error::{PipelineError, Result};

/// First and last year of the EMO-1 archive.
pub const ARCHIVE_YEARS: (i32, i32) = (1950, 2023);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub bbox: BoundingBox,
    pub subset: SubsetConfig,
    pub aggregate: AggregateConfig,
    /// Process files (subset) and variable-years (aggregate) on a thread pool.
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Holds one folder per variable code with the raw archive files.
    pub input_root: PathBuf,
    /// Receives one prefixed folder per variable code.
    pub subset_output_root: PathBuf,
    /// Flat directory of `{variable}_{year}.nc` files to aggregate.
    pub aggregate_input_dir: PathBuf,
    pub table_output_dir: PathBuf,
    /// GeoJSON FeatureCollection of the regions.
    pub regions_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("data/step_3/emo_data"),
            subset_output_root: PathBuf::from("data/step_3/emo_data/cutted_emo"),
            aggregate_input_dir: PathBuf::from("data/step_10"),
            table_output_dir: PathBuf::from("data/step_10/mean-y"),
            regions_file: PathBuf::from("data/step_10/shp/voivodeships.geojson"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    /// Elements per block along the streamed axis.
    pub chunk_size: usize,
    pub chunk_axis: ChunkAxisRule,
    /// Prepended to the variable folder name in the output tree.
    pub folder_prefix: String,
    /// Appended to the input file stem in the output file name.
    pub file_suffix: String,
    pub lon_axis: String,
    pub lat_axis: String,
    /// File extensions (without dot) treated as datasets.
    pub extensions: Vec<String>,
    /// Variable folders under `paths.input_root`.
    pub folders: Vec<String>,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            chunk_size: netcdf_subset::DEFAULT_BLOCK_LEN,
            chunk_axis: ChunkAxisRule::FirstNonSpatial,
            folder_prefix: "Cutted_".to_string(),
            file_suffix: "_poland".to_string(),
            lon_axis: "lon".to_string(),
            lat_axis: "lat".to_string(),
            extensions: vec!["nc".to_string()],
            folders: ["pd", "pr", "ws", "rg", "tn", "tx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SubsetConfig {
    pub fn axes(&self) -> SpatialAxes {
        SpatialAxes::new(self.lon_axis.clone(), self.lat_axis.clone())
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            axis_rule: self.chunk_axis.clone(),
            block_len: self.chunk_size,
        }
    }
}

/// Which years to aggregate.
///
/// In YAML: a list (`[1990, 1991]`), an inclusive range
/// (`{start: 1950, end: 2023}`), or `discover` to scan the input directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearSpec {
    List(Vec<i32>),
    Range { start: i32, end: i32 },
    Mode(YearMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearMode {
    Discover,
}

impl Default for YearSpec {
    fn default() -> Self {
        YearSpec::Range {
            start: ARCHIVE_YEARS.0,
            end: ARCHIVE_YEARS.1,
        }
    }
}

impl YearSpec {
    /// Explicit years in ascending order; `None` in discover mode.
    pub fn years(&self) -> Option<Vec<i32>> {
        match self {
            YearSpec::List(years) => {
                let mut years = years.clone();
                years.sort_unstable();
                years.dedup();
                Some(years)
            }
            YearSpec::Range { start, end } => Some((*start..=*end).collect()),
            YearSpec::Mode(YearMode::Discover) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub variables: Vec<String>,
    pub years: YearSpec,
    /// Variables whose daily mean is scaled to an annual total.
    pub annualized: Vec<String>,
    pub days_per_year: f64,
    /// Feature property holding the region display name.
    pub name_field: String,
    /// Decimal places of the mean column.
    pub decimals: u32,
    /// Written in the mean column when a region has no defined cells.
    pub missing_marker: String,
    pub file_extension: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            variables: ["tx", "tn", "pd", "ws", "rg", "pr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            years: YearSpec::default(),
            annualized: vec!["pr".to_string()],
            days_per_year: 365.0,
            name_field: DEFAULT_NAME_FIELD.to_string(),
            decimals: 4,
            missing_marker: "NaN".to_string(),
            file_extension: "nc".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read, expand and parse a YAML file, then validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: PipelineConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bbox
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        ensure(self.subset.chunk_size > 0, "subset.chunk_size must be greater than 0")?;
        ensure(!self.subset.folders.is_empty(), "subset.folders cannot be empty")?;
        ensure(
            !self.subset.extensions.is_empty(),
            "subset.extensions cannot be empty",
        )?;
        ensure(
            self.subset.lon_axis != self.subset.lat_axis,
            "subset.lon_axis and subset.lat_axis must differ",
        )?;
        ensure(
            !self.aggregate.variables.is_empty(),
            "aggregate.variables cannot be empty",
        )?;
        ensure(
            self.aggregate.days_per_year > 0.0,
            "aggregate.days_per_year must be positive",
        )?;

        match &self.aggregate.years {
            YearSpec::Range { start, end } if start > end => Err(PipelineError::Config(format!(
                "aggregate.years range is inverted: {} > {}",
                start, end
            ))),
            YearSpec::List(years) if years.is_empty() => Err(PipelineError::Config(
                "aggregate.years cannot be an empty list".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Aggregator settings derived from the `subset` and `aggregate` sections.
    pub fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            annualized: self.aggregate.annualized.clone(),
            days_per_year: self.aggregate.days_per_year,
            axes: self.subset.axes(),
            block_len: self.subset.chunk_size,
        }
    }
}

fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(PipelineError::Config(message.to_string()))
    }
}

/// Expand `${VAR}` and `${VAR:-default}` in `content`.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(PipelineError::Config(format!(
                            "Unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }
            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            PipelineError::Config(format!("Environment variable {} not set", expr.trim()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_archive_run() {
        let config = PipelineConfig::default();
        assert_eq!(config.bbox, BoundingBox::POLAND);
        assert_eq!(config.subset.chunk_size, 100);
        assert_eq!(config.subset.folders, vec!["pd", "pr", "ws", "rg", "tn", "tx"]);
        assert_eq!(config.aggregate.years.years().map(|y| y.len()), Some(74));
        assert!(!config.parallel);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
bbox: { lon_min: 14.0, lon_max: 24.0, lat_min: 49.0, lat_max: 55.0 }
subset:
  chunk_size: 10
  chunk_axis: { named: time }
aggregate:
  variables: [tx]
  years: [1991, 1990, 1991]
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.bbox.lon_min, 14.0);
        assert_eq!(config.subset.chunk_size, 10);
        assert_eq!(config.subset.chunk_axis, ChunkAxisRule::Named("time".to_string()));
        assert_eq!(config.subset.folder_prefix, "Cutted_");
        assert_eq!(config.aggregate.years.years(), Some(vec![1990, 1991]));
        assert_eq!(config.aggregate.annualized, vec!["pr"]);
    }

    #[test]
    fn test_year_forms() {
        let range: AggregateConfig = serde_yaml::from_str("years: {start: 2000, end: 2002}").unwrap();
        assert_eq!(range.years.years(), Some(vec![2000, 2001, 2002]));
        let discover: AggregateConfig = serde_yaml::from_str("years: discover").unwrap();
        assert_eq!(discover.years, YearSpec::Mode(YearMode::Discover));
        assert_eq!(discover.years.years(), None);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "bbox: { lon_min: 20.0, lon_max: 10.0, lat_min: 49.0, lat_max: 55.0 }",
            "subset: { chunk_size: 0 }",
            "aggregate: { variables: [] }",
            "aggregate: { years: { start: 2001, end: 2000 } }",
        ];
        for yaml in cases {
            assert!(
                matches!(PipelineConfig::from_yaml_str(yaml), Err(PipelineError::Config(_))),
                "accepted: {}",
                yaml
            );
        }
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("REGIONAL_TEST_ROOT", "/srv/emo");
        std::env::remove_var("REGIONAL_TEST_UNSET");
        let yaml = r#"
paths:
  input_root: ${REGIONAL_TEST_ROOT}/raw
  table_output_dir: ${REGIONAL_TEST_UNSET:-/tmp/tables}
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.paths.input_root, PathBuf::from("/srv/emo/raw"));
        assert_eq!(config.paths.table_output_dir, PathBuf::from("/tmp/tables"));

        assert!(matches!(
            expand_env_vars("${REGIONAL_TEST_UNSET}"),
            Err(PipelineError::Config(_))
        ));
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_aggregation_settings_follow_config() {
        let mut config = PipelineConfig::default();
        config.subset.chunk_size = 7;
        config.aggregate.annualized = vec!["pr".to_string(), "pd".to_string()];
        let settings = config.aggregation_settings();
        assert_eq!(settings.block_len, 7);
        assert_eq!(settings.annualized.len(), 2);
        assert_eq!(settings.axes, SpatialAxes::default());
    }
}
