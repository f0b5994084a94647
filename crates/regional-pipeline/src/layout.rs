//! Where inputs are found and outputs are written.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;

/// Output naming of the subsetting stage.
///
/// `{root}/{prefix}{folder}/{stem}{suffix}.{ext}`: each variable folder gets
/// its own destination directory, distinct from the source folder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub folder_prefix: String,
    pub file_suffix: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, folder_prefix: &str, file_suffix: &str) -> Self {
        Self {
            root: root.into(),
            folder_prefix: folder_prefix.to_string(),
            file_suffix: file_suffix.to_string(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.paths.subset_output_root,
            &config.subset.folder_prefix,
            &config.subset.file_suffix,
        )
    }

    pub fn folder_dir(&self, folder: &str) -> PathBuf {
        self.root.join(format!("{}{}", self.folder_prefix, folder))
    }

    /// Destination of `input` from variable folder `folder`.
    ///
    /// Returns `None` when `input` has no file name.
    pub fn output_file(&self, folder: &str, input: &Path) -> Option<PathBuf> {
        let stem = input.file_stem()?.to_string_lossy();
        let name = match input.extension().and_then(OsStr::to_str) {
            Some(ext) => format!("{}{}.{}", stem, self.file_suffix, ext),
            None => format!("{}{}", stem, self.file_suffix),
        };
        Some(self.folder_dir(folder).join(name))
    }
}

/// Whether `path` has one of `extensions` (compared case-insensitively, no dot).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// `{dir}/{variable}_{year}.{ext}`
pub fn yearly_file(dir: &Path, variable: &str, year: i32, ext: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", variable, year, ext))
}

/// `{dir}/{variable}-mean-y.csv`
pub fn table_file(dir: &Path, variable: &str) -> PathBuf {
    dir.join(format!("{}-mean-y.csv", variable))
}

/// Year key of a `{variable}_{suffix}` file stem.
///
/// `None` when the stem belongs to another variable; `Some(None)` when the
/// suffix is not a year.
pub fn year_of_stem(stem: &str, variable: &str) -> Option<Option<i32>> {
    let suffix = stem.strip_prefix(variable)?.strip_prefix('_')?;
    Some(suffix.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_names() {
        let layout = OutputLayout::new("/out", "Cutted_", "_poland");
        assert_eq!(layout.folder_dir("tx"), PathBuf::from("/out/Cutted_tx"));
        assert_eq!(
            layout.output_file("tx", Path::new("/in/tx/tx_1950.nc")),
            Some(PathBuf::from("/out/Cutted_tx/tx_1950_poland.nc"))
        );
        assert_eq!(
            layout.output_file("pr", Path::new("pr.v2.nc")),
            Some(PathBuf::from("/out/Cutted_pr/pr.v2_poland.nc"))
        );
        assert_eq!(layout.output_file("pr", Path::new("/")), None);
    }

    #[test]
    fn test_extension_filter() {
        let exts = vec!["nc".to_string()];
        assert!(has_extension(Path::new("a/tx_1950.nc"), &exts));
        assert!(has_extension(Path::new("a/tx_1950.NC"), &exts));
        assert!(!has_extension(Path::new("a/tx_1950.nc.part"), &exts));
        assert!(!has_extension(Path::new("a/README"), &exts));
    }

    #[test]
    fn test_year_of_stem() {
        assert_eq!(year_of_stem("tx_1950", "tx"), Some(Some(1950)));
        assert_eq!(year_of_stem("tx_clim", "tx"), Some(None));
        assert_eq!(year_of_stem("tn_1950", "tx"), None);
        assert_eq!(year_of_stem("txx_1950", "tx"), None);
    }

    #[test]
    fn test_yearly_and_table_files() {
        let dir = Path::new("/data");
        assert_eq!(yearly_file(dir, "pr", 1999, "nc"), PathBuf::from("/data/pr_1999.nc"));
        assert_eq!(table_file(dir, "pr"), PathBuf::from("/data/pr-mean-y.csv"));
    }
}
