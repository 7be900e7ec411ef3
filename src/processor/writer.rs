//! Export of dataframes to model point files
//!
//! Each product becomes one file: a header block (`OUTPUT_FORMAT`,
//! `NUMLINES`, `VARIABLE_TYPES`, column names) followed by the data rows.
//! Rows are stable-sorted by the key columns so output does not depend on
//! the input row order. Non-numeric fields are quoted, except the leading
//! `*` marker which is always written bare.

use crate::config::MpfConfig;
use crate::constants::{
    DEFAULT_DATE_FORMAT, LINE_TERMINATOR, MODEL_POINT_HEADER_MARKER, NUMLINES_TAG,
    OUTPUT_FORMAT_TAG, OUTPUT_FORMAT_VALUE, RESULT_HEADER_MARKER, SENTINEL_VALUE,
    VARIABLE_TYPES_TAG,
};
use crate::error::{MpfError, Result};
use crate::schema::{ColumnType, infer_column_type};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options controlling what an export writes and where
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// One file per product (`<dest>/<product>.<ext>`) instead of `<dest>.<ext>`
    pub split_by_product: bool,

    /// Write the `OUTPUT_FORMAT`/`NUMLINES`/`VARIABLE_TYPES` lines
    pub write_header: bool,

    /// Extra columns exported even when they fail the naming rule
    pub include_columns: Vec<String>,

    /// Columns never exported
    pub exclude_columns: Vec<String>,

    /// Sort keys; empty falls back to the config's index columns
    pub sort_by: Vec<String>,

    /// Rendering pattern per date column
    pub date_formats: BTreeMap<String, String>,

    /// Replace existing output instead of failing
    pub overwrite: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            split_by_product: true,
            write_header: true,
            include_columns: Vec::new(),
            exclude_columns: Vec::new(),
            sort_by: Vec::new(),
            date_formats: BTreeMap::new(),
            overwrite: false,
        }
    }
}

/// Columns written to the file, in table order
///
/// Upper-case names without a leading underscore belong to the MPF schema.
pub fn mpf_columns(frame: &DataFrame, options: &ExportOptions, config: &MpfConfig) -> Vec<String> {
    let mut columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| !name.starts_with('_') && name.to_uppercase() == *name)
        .collect();

    if !options.split_by_product && !columns.contains(&config.prod_name_column) {
        columns.insert(0, config.prod_name_column.clone());
    }

    for column in &options.include_columns {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }

    columns.retain(|column| !options.exclude_columns.contains(column));
    columns
}

/// Render one file's worth of rows
pub fn render_mpf(
    frame: &DataFrame,
    columns: &[String],
    options: &ExportOptions,
    config: &MpfConfig,
) -> Result<String> {
    for column in columns {
        require_column(frame, column)?;
    }

    let sorted = sort_rows(frame, columns, options, config)?;
    let selected = sorted.select(columns.iter().map(String::as_str))?;

    let mut column_types = Vec::with_capacity(columns.len());
    for column in selected.get_columns() {
        let format = date_format(column.name().as_str(), options, config);
        column_types.push(infer_column_type(column, format)?);
    }

    let mut text = String::new();
    if options.write_header {
        let codes: Vec<String> = column_types.iter().map(ColumnType::code).collect();
        text.push_str(&format!("{}, {}{}", OUTPUT_FORMAT_TAG, OUTPUT_FORMAT_VALUE, LINE_TERMINATOR));
        text.push_str(&format!("{}, {}{}", NUMLINES_TAG, selected.height(), LINE_TERMINATOR));
        text.push_str(&format!(
            "{},{}{}",
            VARIABLE_TYPES_TAG,
            codes.join(","),
            LINE_TERMINATOR
        ));
    }
    text.push_str(&columns.join(","));
    text.push_str(LINE_TERMINATOR);
    text.push_str(&write_rows(selected, &column_types)?);

    Ok(text)
}

/// Render every product group as `(product name, file text)`
///
/// Groups appear in order of first occurrence of each product.
pub fn render_products(
    frame: &DataFrame,
    options: &ExportOptions,
    config: &MpfConfig,
) -> Result<Vec<(String, String)>> {
    let prod_column = config.prod_name_column.as_str();
    require_column(frame, prod_column)?;
    let columns = mpf_columns(frame, options, config);

    let mut rendered = Vec::new();
    for group in frame.partition_by_stable([prod_column], true)? {
        let product = group.column(prod_column)?.get(0)?.str_value().to_string();
        debug!("Rendering product {} ({} rows)", product, group.height());
        rendered.push((product, render_mpf(&group, &columns, options, config)?));
    }
    Ok(rendered)
}

/// Write a dataframe out as model point files
///
/// Returns the paths written.
pub fn export(
    frame: &DataFrame,
    destination: &Path,
    options: &ExportOptions,
    config: &MpfConfig,
) -> Result<Vec<PathBuf>> {
    if !options.split_by_product {
        let path = PathBuf::from(format!(
            "{}.{}",
            destination.display(),
            config.mpf_extension
        ));
        ensure_writable(&path, options)?;

        let columns = mpf_columns(frame, options, config);
        fs::write(&path, render_mpf(frame, &columns, options, config)?)?;
        info!("Wrote {} rows to {}", frame.height(), path.display());
        return Ok(vec![path]);
    }

    let rendered: Vec<(PathBuf, String)> = render_products(frame, options, config)?
        .into_iter()
        .map(|(product, text)| {
            let path = destination.join(format!("{}.{}", product, config.mpf_extension));
            (path, text)
        })
        .collect();

    // Refuse before anything is written so a failed export leaves no partial set
    for (path, _) in &rendered {
        ensure_writable(path, options)?;
    }
    fs::create_dir_all(destination)?;

    let mut written = Vec::new();
    for (path, text) in rendered {
        fs::write(&path, text)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Write a dataframe as a Snappy-compressed Parquet file
pub fn write_parquet(frame: &mut DataFrame, output_path: &Path) -> Result<()> {
    let file = fs::File::create(output_path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(frame)?;
    info!("Wrote {} rows to {}", frame.height(), output_path.display());
    Ok(())
}

fn require_column(frame: &DataFrame, column: &str) -> Result<()> {
    match frame.get_column_index(column) {
        Some(_) => Ok(()),
        None => Err(MpfError::ColumnNotFound {
            column: column.to_string(),
        }),
    }
}

fn ensure_writable(path: &Path, options: &ExportOptions) -> Result<()> {
    if path.exists() && !options.overwrite {
        return Err(MpfError::OutputExists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn date_format<'a>(column: &str, options: &'a ExportOptions, config: &'a MpfConfig) -> &'a str {
    if let Some(format) = options.date_formats.get(column) {
        return format;
    }
    match config.column_specs.get(column) {
        Some(ColumnType::Date { format }) => format,
        _ => DEFAULT_DATE_FORMAT,
    }
}

/// Stable sort by the explicit keys, the config's index columns, or else
/// the first column after the marker
fn sort_rows(
    frame: &DataFrame,
    columns: &[String],
    options: &ExportOptions,
    config: &MpfConfig,
) -> Result<DataFrame> {
    let keys: Vec<String> = if !options.sort_by.is_empty() {
        for key in &options.sort_by {
            require_column(frame, key)?;
        }
        options.sort_by.clone()
    } else {
        let index_keys: Vec<String> = config
            .index_columns
            .iter()
            .filter(|key| frame.get_column_index(key.as_str()).is_some())
            .cloned()
            .collect();
        if index_keys.is_empty() {
            let marker = columns
                .iter()
                .position(|name| name.starts_with([MODEL_POINT_HEADER_MARKER, RESULT_HEADER_MARKER]))
                .unwrap_or(0);
            columns.get(marker + 1).cloned().into_iter().collect()
        } else {
            index_keys
        }
    };

    if keys.is_empty() {
        return Ok(frame.clone());
    }

    let sorted = frame
        .clone()
        .lazy()
        .sort_by_exprs(
            keys.iter().map(|key| col(key.as_str())).collect::<Vec<_>>(),
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;
    Ok(sorted)
}

/// Serialise rows without a header, quoting non-numeric fields
fn write_rows(frame: DataFrame, column_types: &[ColumnType]) -> Result<String> {
    let date_conversions: Vec<Expr> = frame
        .get_columns()
        .iter()
        .zip(column_types)
        .filter_map(|(column, column_type)| match column_type {
            ColumnType::Date { format } => Some(
                col(column.name().as_str())
                    .dt()
                    .to_string(format)
                    .alias(column.name().as_str()),
            ),
            _ => None,
        })
        .collect();

    let mut frame = if date_conversions.is_empty() {
        frame
    } else {
        frame.lazy().with_columns(date_conversions).collect()?
    };

    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(false)
        .with_quote_style(QuoteStyle::NonNumeric)
        .with_line_terminator(LINE_TERMINATOR.to_string())
        .finish(&mut frame)?;

    Ok(unquote_sentinel(&String::from_utf8_lossy(&buffer)))
}

/// Strip the quotes the writer puts around a leading `*`
///
/// Only record starts are touched; line breaks inside quoted values are
/// copied through unchanged.
fn unquote_sentinel(rows: &str) -> String {
    let quoted = format!("\"{}\"", SENTINEL_VALUE);
    let mut output = String::with_capacity(rows.len());
    let mut rest = rows;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(quoted.as_str()) {
            if after.is_empty() || after.starts_with([',', '\n']) {
                output.push_str(SENTINEL_VALUE);
                rest = after;
            }
        }

        let record_len = record_length(rest);
        output.push_str(&rest[..record_len]);
        rest = &rest[record_len..];
    }
    output
}

/// Byte length of the first record, including its terminating newline
fn record_length(rows: &str) -> usize {
    let mut in_quotes = false;
    for (index, byte) in rows.bytes().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => return index + 1,
            _ => {}
        }
    }
    rows.len()
}
