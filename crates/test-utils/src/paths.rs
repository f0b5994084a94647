//! Input trees shaped like the production data root
//! (`{root}/{folder}/{variable}_{year}.nc`).

use std::path::{Path, PathBuf};

/// Path of the file for `variable` and `year` inside `folder` of an input root,
/// creating the folder if needed.
pub fn input_file_path(root: &Path, folder: &str, variable: &str, year: i32) -> PathBuf {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).expect("Failed to create input folder");
    dir.join(format!("{}_{}.nc", variable, year))
}
