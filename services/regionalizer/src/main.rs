//! Regional climate batch driver.
//!
//! Cuts EMO-style daily archives to a bounding box and computes regional
//! means per variable and year.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use regional_pipeline::{AggregateRunner, PipelineConfig, RunSummary, SubsetRunner};
use tracing::info;

use cli::{Args, Command};

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    cli::init_tracing(&args.log_level, args.log_format)?;

    let config = args.load_config()?;
    info!(
        command = ?args.command,
        bbox = %config.bbox,
        parallel = config.parallel,
        "Starting regionalizer"
    );

    if args.command == Command::ValidateConfig {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        println!("{}", yaml);
        return Ok(());
    }

    netcdf_subset::silence_hdf5_errors();

    let summaries = match args.command {
        Command::Subset => vec![subset(&config)?],
        Command::Aggregate => vec![aggregate(&config)?],
        Command::Run => vec![subset(&config)?, aggregate(&config)?],
        Command::ValidateConfig => Vec::new(),
    };

    for summary in &summaries {
        println!("{}", summary);
    }
    Ok(())
}

fn subset(config: &PipelineConfig) -> Result<RunSummary> {
    SubsetRunner::new(config)
        .run()
        .context("Subsetting stage aborted")
}

fn aggregate(config: &PipelineConfig) -> Result<RunSummary> {
    AggregateRunner::from_config(config)
        .context("Failed to prepare aggregation")?
        .run()
        .context("Aggregation stage aborted")
}
