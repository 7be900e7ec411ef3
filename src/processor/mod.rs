//! Loading and exporting model point files.
//!
//! Ties the header scan, the read plan and the polars reader together:
//! [`read_mpf`] loads one file, [`load_files`] concatenates several in the
//! order given, [`read_fac`] loads a reference table and its composite key.
//! Export lives in [`writer`], path resolution in [`discovery`].

pub mod discovery;
pub mod loader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::product_name;
use self::loader::{build_read_plan, build_table_plan, read_frame, read_source};

use crate::config::MpfConfig;
use crate::error::{MpfError, Result};
use crate::header::scan;
use crate::models::{FacTable, LoadedFiles, LoadedMpf, ScanMode};

use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load one model point file
///
/// The product-name column (file stem) is always added; the file-name
/// column (full path) only when the config names one.
pub fn read_mpf(file_path: &Path, config: &MpfConfig) -> Result<LoadedMpf> {
    let text = read_source(file_path)?;
    let metadata = scan(text.as_bytes(), file_path, ScanMode::ModelPoint)?;
    let plan = build_read_plan(&metadata, config)?;
    debug!(
        "Reading {} rows from {} (header at line {})",
        plan.row_limit,
        file_path.display(),
        plan.skip_rows
    );

    let (frame, read_warnings) = read_frame(&text, &plan, &metadata)?;

    let mut source_columns = vec![lit(product_name(file_path)).alias(config.prod_name_column.as_str())];
    if let Some(file_name_column) = &config.file_name_column {
        source_columns.push(lit(file_path.display().to_string()).alias(file_name_column.as_str()));
    }
    let frame = frame.lazy().with_columns(source_columns).collect()?;

    let mut warnings = metadata.warnings.clone();
    warnings.extend(read_warnings);

    info!(
        "Loaded {} rows x {} columns from {}",
        frame.height(),
        frame.width(),
        file_path.display()
    );

    Ok(LoadedMpf {
        metadata,
        frame,
        warnings,
        date_formats: plan.date_columns,
    })
}

/// Load several model point files into one table
///
/// Columns are unioned across files; rows keep the order of `paths`.
pub fn load_files(paths: &[impl AsRef<Path>], config: &MpfConfig) -> Result<DataFrame> {
    Ok(load_files_with_formats(paths, config)?.frame)
}

/// [`load_files`], keeping the date patterns needed to write the table back
pub fn load_files_with_formats(
    paths: &[impl AsRef<Path>],
    config: &MpfConfig,
) -> Result<LoadedFiles> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        loaded.push(read_mpf(path.as_ref(), config)?);
    }
    LoadedFiles::combine(loaded)
}

impl LoadedFiles {
    /// Concatenate loaded files in order and merge their date patterns
    pub fn combine(loaded: Vec<LoadedMpf>) -> Result<Self> {
        let mut date_formats = BTreeMap::new();
        let mut warning_count = 0;
        let mut frames = Vec::with_capacity(loaded.len());

        for file in loaded {
            for (column, format) in file.date_formats {
                match date_formats.get(&column) {
                    Some(existing) if *existing != format => debug!(
                        "{} declares {} as {}, keeping {}",
                        file.metadata.path.display(),
                        column,
                        format,
                        existing
                    ),
                    Some(_) => {}
                    None => {
                        date_formats.insert(column, format);
                    }
                }
            }
            warning_count += file.warnings.len();
            frames.push(file.frame);
        }

        Ok(LoadedFiles {
            frame: concat_frames(frames)?,
            date_formats,
            warning_count,
        })
    }
}

/// Diagonal concatenation that promotes mismatched dtypes to a common type
pub fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    match frames.len() {
        0 => Ok(DataFrame::empty()),
        1 => Ok(frames.into_iter().next().unwrap_or_default()),
        _ => {
            let lazy_frames: Vec<LazyFrame> = frames.into_iter().map(|frame| frame.lazy()).collect();
            let combined = concat_lf_diagonal(
                lazy_frames,
                UnionArgs {
                    to_supertypes: true,
                    ..Default::default()
                },
            )?
            .collect()?;
            Ok(combined)
        }
    }
}

/// Load a fac reference table
///
/// A header of `!N` marks the N columns after the marker as the composite key.
pub fn read_fac(file_path: &Path) -> Result<FacTable> {
    let text = read_source(file_path)?;
    let metadata = scan(text.as_bytes(), file_path, ScanMode::Table)?;
    let key_width = metadata.composite_key_width()?;
    let key_columns = metadata.column_names[1..=key_width].to_vec();

    let plan = build_table_plan(&metadata);
    let (frame, warnings) = read_frame(&text, &plan, &metadata)?;
    if !warnings.is_empty() {
        warn!(
            "Dropped {} malformed rows from {}",
            warnings.len(),
            file_path.display()
        );
    }

    info!(
        "Loaded fac table {} ({} rows, key {:?})",
        file_path.display(),
        frame.height(),
        key_columns
    );

    Ok(FacTable { frame, key_columns })
}

impl FacTable {
    /// True when some row matches `values` on every key column
    ///
    /// Values are compared as text, so `"42"` matches an integer 42.
    pub fn contains_key(&self, values: &[&str]) -> Result<bool> {
        if values.len() != self.key_columns.len() {
            return Err(MpfError::Configuration {
                message: format!(
                    "expected {} key values, got {}",
                    self.key_columns.len(),
                    values.len()
                ),
            });
        }

        let predicate = self
            .key_columns
            .iter()
            .zip(values)
            .map(|(column, value)| col(column.as_str()).cast(DataType::String).eq(lit(*value)))
            .reduce(|acc, expr| acc.and(expr));

        let Some(predicate) = predicate else {
            return Ok(false);
        };

        let matches = self.frame.clone().lazy().filter(predicate).collect()?;
        Ok(matches.height() > 0)
    }

    /// Distinct values of one column as text, in order of first appearance
    pub fn key_values(&self, column: &str) -> Result<Vec<String>> {
        let values = self
            .frame
            .column(column)
            .map_err(|_| MpfError::ColumnNotFound {
                column: column.to_string(),
            })?
            .as_materialized_series()
            .cast(&DataType::String)?
            .unique_stable()?;

        Ok(values
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect())
    }
}
