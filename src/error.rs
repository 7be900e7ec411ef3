//! Error handling for model point file operations.
//!
//! Fatal failures are [`MpfError`] variants; recoverable findings that do not
//! abort a read are collected as [`MpfWarning`] values and logged.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Malformed model point file: {path} - {reason}")]
    MalformedFile { path: PathBuf, reason: String },

    #[error(
        "Unknown type code '{code}'{}",
        .column.as_ref().map(|c| format!(" for column '{}'", c)).unwrap_or_default()
    )]
    UnknownTypeCode {
        code: String,
        column: Option<String>,
    },

    #[error("Invalid date format '{format}' in type code")]
    InvalidDateFormat { format: String },

    #[error("Unsupported column type for export: column '{column}' has type {dtype}")]
    UnsupportedColumnType { column: String, dtype: String },

    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Output already exists: {path}")]
    OutputExists { path: PathBuf },

    #[error("Config file already exists: {path}")]
    ConfigExists { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Config file is not valid JSON: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("No folder matches {filters:?}; available folders: {available:?}")]
    FolderNotFound {
        filters: Vec<String>,
        available: Vec<PathBuf>,
    },

    #[error("File not found: {name} (searched {searched:?})")]
    FileNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("File discovery failed: {0}")]
    Glob(#[from] glob::GlobError),
}

impl MpfError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MpfError>;

/// Non-fatal findings raised while reading a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpfWarning {
    /// `NUMLINES` disagrees with the number of data rows actually present
    RowCountMismatch { declared: usize, actual: usize },

    /// A data row was dropped because it could not be parsed
    BadDataRow { line: usize, reason: String },
}

impl fmt::Display for MpfWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpfWarning::RowCountMismatch { declared, actual } => write!(
                f,
                "actual lines loaded ({}) different from NUMLINES ({})",
                actual, declared
            ),
            MpfWarning::BadDataRow { line, reason } => {
                write!(f, "skipped data row at line {}: {}", line, reason)
            }
        }
    }
}
