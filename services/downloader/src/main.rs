//! EMO-1 archive downloader.
//!
//! Reads the HTTP directory index of each variable folder and fetches every
//! NetCDF file not already present locally.

mod fetch;
mod listing;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fetch::{FetchConfig, Fetcher};

const DEFAULT_BASE_URL: &str =
    "https://jeodpp.jrc.ec.europa.eu/ftp/jrc-opendata/CEMS-EFAS/meteorological_forcings/EMO-1arcmin";

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Download EMO-1 NetCDF archives")]
struct Args {
    /// Archive root; each folder is a subdirectory of it
    #[arg(long, env = "EMO_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Variable folders to fetch
    #[arg(long, value_delimiter = ',', default_value = "pr,rg,tn,tx,ws")]
    folders: Vec<String>,

    /// Local root; files land in <output-dir>/<folder>
    #[arg(short, long, env = "EMO_OUTPUT_DIR", default_value = "data/step_3/emo_data")]
    output_dir: PathBuf,

    /// Files fetched at the same time within a folder
    #[arg(long, default_value = "1")]
    max_concurrent: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "3600")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        base_url = %args.base_url,
        folders = ?args.folders,
        output_dir = %args.output_dir.display(),
        "Starting downloader"
    );

    let fetcher = Fetcher::new(FetchConfig {
        base_url: args.base_url,
        output_dir: args.output_dir,
        max_concurrent: args.max_concurrent,
        request_timeout: Duration::from_secs(args.timeout_secs),
    })?;
    let summary = fetcher.run(&args.folders).await;
    println!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["downloader"]);
        assert_eq!(args.folders, vec!["pr", "rg", "tn", "tx", "ws"]);
        assert_eq!(args.max_concurrent, 1);
    }

    #[test]
    fn test_folder_list_override() {
        let args = Args::parse_from(["downloader", "--folders", "tx,tn", "-o", "/tmp/emo"]);
        assert_eq!(args.folders, vec!["tx", "tn"]);
        assert_eq!(args.output_dir, PathBuf::from("/tmp/emo"));
    }
}
