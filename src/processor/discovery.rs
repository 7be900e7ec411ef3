//! File discovery for model point files and fac tables
//!
//! Resolves the configured search folders and file patterns into concrete
//! paths. Everything downstream works on already-resolved paths.

use crate::error::{MpfError, Result};
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Normalise a file pattern so that it always targets `extension`
///
/// No pattern selects every file with the extension; a pattern without the
/// extension gets it appended (compared case-insensitively).
pub fn file_pattern(pattern: Option<&str>, extension: &str) -> String {
    let suffix = format!(".{}", extension);
    match pattern {
        None => format!("*{}", suffix),
        Some(pattern) if pattern.to_lowercase().contains(&suffix.to_lowercase()) => {
            pattern.to_string()
        }
        Some(pattern) => format!("{}{}", pattern, suffix),
    }
}

/// First folder whose path contains every filter string
pub fn resolve_folder(folders: &[PathBuf], filters: &[String]) -> Result<PathBuf> {
    folders
        .iter()
        .find(|folder| {
            let folder = folder.to_string_lossy();
            filters.iter().all(|filter| folder.contains(filter.as_str()))
        })
        .cloned()
        .ok_or_else(|| MpfError::FolderNotFound {
            filters: filters.to_vec(),
            available: folders.to_vec(),
        })
}

/// Files in `folder` matching a glob pattern, sorted by path
pub fn find_files(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = folder.join(pattern);
    debug!("Searching for files matching: {}", full_pattern.display());

    let mut files = Vec::new();
    for entry in glob(&full_pattern.to_string_lossy())? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    debug!("Found {} files in {}", files.len(), folder.display());
    Ok(files)
}

/// Locate a fac table by name in the first folder that holds it
pub fn find_fac(name: &str, folders: &[PathBuf], extension: &str) -> Result<PathBuf> {
    let file_name = file_pattern(Some(name), extension);

    folders
        .iter()
        .map(|folder| folder.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| MpfError::FileNotFound {
            name: file_name,
            searched: folders.to_vec(),
        })
}

/// Product name of a model point file: its file stem
pub fn product_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
