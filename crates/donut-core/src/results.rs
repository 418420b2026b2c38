//! Discovery and collection of JSON result files.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::domain::Result;

/// Files picked up from the source directory, at any depth.
pub const RESULT_PATTERN: &str = "**/*.json";

/// Version-control directories never scanned for results.
const DEFAULT_EXCLUDES: &[&str] = &[".git", ".svn", ".hg", ".bzr", "CVS"];

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| DEFAULT_EXCLUDES.contains(&name))
            .unwrap_or(false)
}

fn is_result_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "json")
}

fn walk(dir: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
}

/// Whether `dir` contains at least one result file.
///
/// A directory that does not exist or cannot be read has no results.
pub fn has_results(dir: &Path) -> bool {
    walk(dir).filter_map(|e| e.ok()).any(|e| is_result_file(&e))
}

/// Result files under `dir`, relative to it, in file-name order.
pub fn result_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walk(dir) {
        let entry = entry?;
        if is_result_file(&entry) {
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Copy every result file from `source` into `destination`, keeping the
/// relative layout. Existing files are overwritten. Returns the number of
/// files copied.
pub fn copy_results(source: &Path, destination: &Path) -> Result<usize> {
    let files = result_files(source)?;

    for relative in &files {
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source.join(relative), &target)?;
        debug!(file = %relative.display(), "Copied result file");
    }

    Ok(files.len())
}
