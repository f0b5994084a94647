//! Folder-by-folder archive download.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn};

use crate::listing::{extract_nc_links, file_name, resolve};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub max_concurrent: usize,
    pub request_timeout: Duration,
}

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FetchSummary {
    fn merge(&mut self, other: FetchSummary) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "download: {} downloaded, {} skipped, {} failed",
            self.downloaded, self.skipped, self.failed
        )
    }
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, config })
    }

    fn folder_url(&self, folder: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), folder)
    }

    /// Fetch every listed folder. A folder whose index cannot be read is
    /// counted as one failure; the remaining folders still run.
    pub async fn run(&self, folders: &[String]) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for folder in folders {
            match self.fetch_folder(folder).await {
                Ok(folder_summary) => summary.merge(folder_summary),
                Err(e) => {
                    error!(folder = %folder, error = %e, "Failed to process folder");
                    summary.failed += 1;
                }
            }
        }
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Run complete"
        );
        summary
    }

    #[instrument(skip(self))]
    pub async fn fetch_folder(&self, folder: &str) -> Result<FetchSummary> {
        let folder_url = self.folder_url(folder);
        let links = self.list(&folder_url).await?;
        let dir = self.config.output_dir.join(folder);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let (jobs, skipped) = plan(&folder_url, &links, &dir);
        info!(links = links.len(), pending = jobs.len(), skipped, "Listed folder");

        let mut summary = FetchSummary {
            skipped,
            ..FetchSummary::default()
        };
        let results: Vec<(FetchJob, Result<u64>)> = stream::iter(jobs)
            .map(|job| async move {
                let result = self.download(&job).await;
                (job, result)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        for (job, result) in results {
            match result {
                Ok(bytes) => {
                    info!(path = %job.dest.display(), bytes, "Downloaded");
                    summary.downloaded += 1;
                }
                Err(e) => {
                    warn!(url = %job.url, error = %e, "Download failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn list(&self, folder_url: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(folder_url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch index {}", folder_url))?;
        if !response.status().is_success() {
            return Err(anyhow!("Index {} returned {}", folder_url, response.status()));
        }
        let html = response.text().await?;
        Ok(extract_nc_links(&html))
    }

    async fn download(&self, job: &FetchJob) -> Result<u64> {
        let response = self.client.get(&job.url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }
        save_body(response.bytes_stream(), &job.dest).await
    }
}

/// Stream `body` to `<dest>.partial`, then move it into place. The partial
/// file is removed on any failure.
pub async fn save_body<S, B, E>(body: S, dest: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let partial = partial_path(dest);
    let result = match write_stream(body, &partial).await {
        Ok(written) => move_into_place(&partial, dest).await.map(|()| written),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&partial).await;
    }
    result
}

async fn write_stream<S, B, E>(body: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    futures::pin_mut!(body);
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn move_into_place(partial: &Path, dest: &Path) -> Result<()> {
    if fs::rename(partial, dest).await.is_err() {
        fs::copy(partial, dest).await?;
        fs::remove_file(partial).await?;
    }
    Ok(())
}

/// Jobs for every link without a local copy, and the number already present.
pub fn plan(folder_url: &str, links: &[String], dir: &Path) -> (Vec<FetchJob>, usize) {
    let mut jobs = Vec::new();
    let mut skipped = 0;
    for link in links {
        let Some(name) = file_name(link) else {
            continue;
        };
        let dest = dir.join(name);
        if dest.exists() {
            skipped += 1;
            continue;
        }
        jobs.push(FetchJob {
            url: resolve(folder_url, link),
            dest,
        });
    }
    (jobs, skipped)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}
