//! Command-line arguments and logging set-up.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use region_common::BoundingBox;
use regional_pipeline::PipelineConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "regionalizer")]
#[command(about = "Cut climate archives to a region and compute regional means")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration file (YAML); built-in defaults when omitted
    #[arg(short, long, env = "REGIONALIZER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Bounding box override: lon_min,lon_max,lat_min,lat_max
    #[arg(long, global = true, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Block length along the streamed axis
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Process files and variable-years in parallel
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Cut every archive file to the bounding box
    Subset,
    /// Compute regional means and write one table per variable
    Aggregate,
    /// Subset, then aggregate
    Run,
    /// Print the effective configuration and exit
    ValidateConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

fn parse_bbox(s: &str) -> std::result::Result<BoundingBox, String> {
    BoundingBox::from_str_list(s).map_err(|e| e.to_string())
}

impl Args {
    /// Load the configuration file (or defaults) and apply CLI overrides.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(bbox) = self.bbox {
            config.bbox = bbox;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.subset.chunk_size = chunk_size;
        }
        if self.parallel {
            config.parallel = true;
        }

        config.validate().context("Invalid configuration after overrides")?;
        Ok(config)
    }
}

pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global tracing subscriber.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_overrides() {
        let args = Args::parse_from([
            "regionalizer",
            "subset",
            "--bbox",
            "14.0,24.5,49.0,55.0",
            "--chunk-size",
            "50",
            "--parallel",
            "--log-format",
            "pretty",
        ]);
        assert_eq!(args.command, Command::Subset);
        assert_eq!(args.log_format, LogFormat::Pretty);

        let args = Args { config: None, ..args };
        let config = args.load_config().unwrap();
        assert_eq!(config.bbox, BoundingBox::new(14.0, 24.5, 49.0, 55.0).unwrap());
        assert_eq!(config.subset.chunk_size, 50);
        assert!(config.parallel);
    }

    #[test]
    fn test_defaults_without_config_file() {
        let args = Args::parse_from(["regionalizer", "validate-config"]);
        assert_eq!(args.log_format, LogFormat::Json);
        // REGIONALIZER_CONFIG may be set in the environment
        let args = Args { config: None, ..args };
        let config = args.load_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_bad_overrides_rejected() {
        assert!(Args::try_parse_from(["regionalizer", "run", "--bbox", "1,2,3"]).is_err());
        let args = Args::parse_from(["regionalizer", "run", "--chunk-size", "0"]);
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_config_file_then_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regional.yaml");
        std::fs::write(&path, "subset:\n  chunk_size: 25\nparallel: false\n").unwrap();

        let args = Args::parse_from([
            "regionalizer",
            "aggregate",
            "--config",
            path.to_str().unwrap(),
            "--parallel",
        ]);
        let config = args.load_config().unwrap();
        assert_eq!(config.subset.chunk_size, 25);
        assert!(config.parallel);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }
}
