//! Subsetting stage: every dataset file of every variable folder, restricted
//! to the configured bounding box.

use std::fs;
use std::path::{Path, PathBuf};

use netcdf_subset::Subsetter;
use rayon::prelude::*;
use tracing::{error, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::layout::{has_extension, OutputLayout};
use crate::outcome::{RunSummary, UnitOutcome};

pub struct SubsetRunner<'a> {
    config: &'a PipelineConfig,
    subsetter: Subsetter,
    layout: OutputLayout,
}

impl<'a> SubsetRunner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        let subsetter = Subsetter::new(config.bbox)
            .with_axes(config.subset.axes())
            .with_policy(config.subset.chunk_policy());
        Self {
            config,
            subsetter,
            layout: OutputLayout::from_config(config),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process every configured folder.
    ///
    /// Only a failure to create the output root aborts; anything else is
    /// recorded in the summary and the run moves on.
    #[instrument(skip_all, fields(bbox = %self.config.bbox))]
    pub fn run(&self) -> Result<RunSummary> {
        fs::create_dir_all(&self.layout.root).map_err(|source| PipelineError::OutputRoot {
            path: self.layout.root.clone(),
            source,
        })?;

        let mut summary = RunSummary::new("subset");
        for folder in &self.config.subset.folders {
            summary.merge(self.run_folder(folder));
        }
        summary.log();
        Ok(summary)
    }

    /// Process one variable folder under the input root.
    pub fn run_folder(&self, folder: &str) -> RunSummary {
        let mut summary = RunSummary::new("subset");
        let dir = self.config.paths.input_root.join(folder);

        if !dir.is_dir() {
            warn!(folder = %dir.display(), "Folder not found, skipping");
            summary.record(folder, UnitOutcome::skipped("folder not found"));
            return summary;
        }

        let files = match self.discover(&dir) {
            Ok(files) => files,
            Err(e) => {
                error!(folder = %dir.display(), error = %e, "Failed to scan folder");
                summary.record(folder, UnitOutcome::failed(e));
                return summary;
            }
        };

        let out_dir = self.layout.folder_dir(folder);
        if let Err(e) = fs::create_dir_all(&out_dir) {
            error!(folder = %out_dir.display(), error = %e, "Failed to create output folder");
            summary.record(folder, UnitOutcome::failed(e));
            return summary;
        }

        info!(folder = %dir.display(), files = files.len(), "Processing folder");

        let outcomes: Vec<(String, UnitOutcome)> = if self.config.parallel {
            files
                .par_iter()
                .map(|file| (file.display().to_string(), self.subset_one(folder, file)))
                .collect()
        } else {
            files
                .iter()
                .map(|file| (file.display().to_string(), self.subset_one(folder, file)))
                .collect()
        };

        for (unit, outcome) in outcomes {
            summary.record(unit, outcome);
        }
        summary
    }

    /// Subset one input file into its destination. The destination folder
    /// must already exist.
    pub fn subset_one(&self, folder: &str, input: &Path) -> UnitOutcome {
        let Some(output) = self.layout.output_file(folder, input) else {
            return UnitOutcome::failed(format!("no file name in {}", input.display()));
        };

        info!(file = %input.display(), "Processing file");
        match self.subsetter.subset_file(input, &output) {
            Ok(_) => {
                info!(output = %output.display(), "Created subset file");
                UnitOutcome::Processed
            }
            Err(e) => {
                error!(file = %input.display(), error = %e, "Failed to subset file");
                UnitOutcome::failed(e)
            }
        }
    }

    /// Dataset files directly inside `dir`, sorted by name.
    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file()
                && has_extension(entry.path(), &self.config.subset.extensions)
            {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{fixtures::grid, input_file_path, ClimateFileBuilder};

    fn config(root: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.input_root = root.join("raw");
        config.paths.subset_output_root = root.join("cut");
        config.bbox = region_common::BoundingBox::new(10.9, 13.1, 50.9, 52.1).unwrap();
        config.subset.folders = vec!["tx".to_string(), "pd".to_string()];
        config
    }

    #[test]
    fn test_missing_folder_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let summary = SubsetRunner::new(&config).run().unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert!(dir.path().join("cut").is_dir());
    }

    #[test]
    fn test_bad_file_does_not_stop_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let raw = dir.path().join("raw");

        ClimateFileBuilder::new("tx", grid::SMALL, 2)
            .write(&input_file_path(&raw, "tx", "tx", 1950));
        fs::write(raw.join("tx").join("tx_1951.nc"), b"not a netcdf file").unwrap();
        ClimateFileBuilder::new("tx", grid::SMALL, 2)
            .write(&input_file_path(&raw, "tx", "tx", 1952));
        fs::write(raw.join("tx").join("notes.txt"), b"ignored").unwrap();

        let summary = SubsetRunner::new(&config).run().unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.failures[0].unit.ends_with("tx_1951.nc"));

        let out = dir.path().join("cut").join("Cutted_tx");
        assert!(out.join("tx_1950_poland.nc").exists());
        assert!(out.join("tx_1952_poland.nc").exists());
        assert!(!out.join("tx_1951_poland.nc").exists());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let raw = dir.path().join("raw");
        for year in 1950..1954 {
            ClimateFileBuilder::new("tx", grid::SMALL, 3)
                .write(&input_file_path(&raw, "tx", "tx", year));
        }

        config.parallel = true;
        let summary = SubsetRunner::new(&config).run().unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(
            fs::read_dir(dir.path().join("cut").join("Cutted_tx")).unwrap().count(),
            4
        );
    }

    #[test]
    fn test_unwritable_output_root_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        config.paths.subset_output_root = blocker.join("cut");

        assert!(matches!(
            SubsetRunner::new(&config).run(),
            Err(PipelineError::OutputRoot { .. })
        ));
    }
}
