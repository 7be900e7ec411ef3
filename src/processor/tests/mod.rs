//! Tests for the processor module
//!
//! Exercise loading, export and fac tables against model point files
//! written to temporary directories.


use std::fs;
use std::path::{Path, PathBuf};

/// Write `content` to `dir/name` and return the path
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
