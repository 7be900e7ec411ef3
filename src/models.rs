//! Core data structures for model point processing.
//!
//! Defines the metadata recovered by the header scan, the read plan handed
//! to the CSV reader, and the loaded table wrappers.

use crate::constants::MODEL_POINT_HEADER_MARKER;
use crate::error::{MpfError, MpfWarning, Result};
use crate::schema::ColumnType;
use polars::prelude::{DataFrame, DataType};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Which kind of file a header scan is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Model point or result file: `!` or `&` header, optional type line
    ModelPoint,
    /// fac reference table: `!` header only, no type line
    Table,
}

/// Metadata recovered from a single forward scan of a file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub path: PathBuf,
    /// Zero-based line offset of the column header row
    pub header_row_index: usize,
    pub declared_row_count: Option<usize>,
    pub actual_row_count: usize,
    pub column_names: Vec<String>,
    pub column_type_codes: Option<Vec<String>>,
    pub date_columns: BTreeSet<String>,
    pub warnings: Vec<MpfWarning>,
}

impl FileMetadata {
    /// Type codes paired with their column names, in file order
    pub fn typed_columns(&self) -> Vec<(&str, &str)> {
        match &self.column_type_codes {
            Some(codes) => self
                .column_names
                .iter()
                .zip(codes)
                .map(|(name, code)| (name.as_str(), code.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Name of the leading marker column
    pub fn marker_column(&self) -> &str {
        self.column_names.first().map(String::as_str).unwrap_or("")
    }

    /// Number of columns after the marker that form a fac table's composite key
    ///
    /// Encoded as the numeric suffix of the marker column, e.g. `!3`.
    pub fn composite_key_width(&self) -> Result<usize> {
        let marker = self.marker_column();
        let suffix = marker
            .strip_prefix(MODEL_POINT_HEADER_MARKER)
            .unwrap_or(marker)
            .trim();

        let width: usize = suffix.parse().map_err(|_| {
            MpfError::malformed(
                &self.path,
                format!("first column '{}' does not encode a key width", marker),
            )
        })?;

        if width >= self.column_names.len() {
            return Err(MpfError::malformed(
                &self.path,
                format!(
                    "key width {} exceeds the {} columns after the marker",
                    width,
                    self.column_names.len() - 1
                ),
            ));
        }

        Ok(width)
    }
}

/// Instructions for the CSV reader derived from [`FileMetadata`]
#[derive(Debug, Clone)]
pub struct ReadPlan {
    /// Lines preceding the column header row
    pub skip_rows: usize,
    /// Column types forced on the reader, keyed by column name
    pub dtype_overrides: BTreeMap<String, ColumnType>,
    /// Maximum number of data rows to read
    pub row_limit: usize,
    /// Columns parsed as dates after reading, with their formats
    pub date_columns: BTreeMap<String, String>,
}

impl ReadPlan {
    /// Polars dtypes for the overridden columns, excluding date columns
    ///
    /// Dates are read as text and converted with their own format afterwards.
    pub fn reader_dtypes(&self) -> Vec<(String, DataType)> {
        self.dtype_overrides
            .iter()
            .map(|(name, column_type)| {
                let dtype = if self.date_columns.contains_key(name) {
                    DataType::String
                } else {
                    column_type.reader_dtype()
                };
                (name.clone(), dtype)
            })
            .collect()
    }
}

/// A model point file materialised as a dataframe
#[derive(Debug, Clone)]
pub struct LoadedMpf {
    pub metadata: FileMetadata,
    pub frame: DataFrame,
    /// Scan warnings followed by rows dropped while reading
    pub warnings: Vec<MpfWarning>,
    /// Rendering pattern of each date column, as declared or configured
    pub date_formats: BTreeMap<String, String>,
}

/// Several model point files concatenated into one table
#[derive(Debug, Clone)]
pub struct LoadedFiles {
    pub frame: DataFrame,
    /// Date patterns merged across files; the first file to declare a column wins
    pub date_formats: BTreeMap<String, String>,
    pub warning_count: usize,
}

/// A fac reference table with its composite key columns
#[derive(Debug, Clone)]
pub struct FacTable {
    pub frame: DataFrame,
    pub key_columns: Vec<String>,
}
