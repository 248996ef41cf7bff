//! Log file discovery inside run directories

use std::path::{Path, PathBuf};

use globset::Glob;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Files directly inside `dir` whose name matches `pattern`, sorted.
///
/// A missing directory yields no files.
pub(crate) fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let matcher = Glob::new(pattern)
        .map_err(|e| Error::Other(format!("invalid log pattern '{pattern}': {e}")))?
        .compile_matcher();

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && matcher.is_match(entry.file_name()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    Ok(files)
}
