//! Reading model point files into dataframes
//!
//! The header scan produces a [`ReadPlan`]; the plan selects the header and
//! data lines handed to the polars CSV reader, forces the declared dtypes
//! and names the columns converted to dates afterwards.

use crate::config::MpfConfig;
use crate::constants::SENTINEL;
use crate::error::{MpfError, MpfWarning, Result};
use crate::header::decode_line;
use crate::models::{FileMetadata, ReadPlan};
use crate::schema::ColumnType;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Read a whole file as text, decoding legacy single-byte lines as Latin-1
pub fn read_source(file_path: &Path) -> Result<String> {
    let bytes = fs::read(file_path).map_err(MpfError::Io)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            debug!("{} is not UTF-8, decoding per line", file_path.display());
            Ok(err
                .as_bytes()
                .split_inclusive(|&byte| byte == b'\n')
                .map(decode_line)
                .collect())
        }
    }
}

/// Derive the reader configuration for a scanned model point file
///
/// Types come from the file's `VARIABLE_TYPES` line, then the config's
/// column specs (which win). The marker column is always a sentinel.
pub fn build_read_plan(metadata: &FileMetadata, config: &MpfConfig) -> Result<ReadPlan> {
    let mut dtype_overrides = BTreeMap::new();

    for (name, code) in metadata.typed_columns() {
        let column_type = ColumnType::decode(code).map_err(|err| match err {
            MpfError::UnknownTypeCode { code, .. } => MpfError::UnknownTypeCode {
                code,
                column: Some(name.to_string()),
            },
            other => other,
        })?;
        dtype_overrides.insert(name.to_string(), column_type);
    }

    for (name, column_type) in &config.column_specs {
        if metadata.column_names.contains(name) {
            dtype_overrides.insert(name.clone(), column_type.clone());
        }
    }

    dtype_overrides.insert(metadata.marker_column().to_string(), ColumnType::Sentinel);

    let date_columns = dtype_overrides
        .iter()
        .filter_map(|(name, column_type)| match column_type {
            ColumnType::Date { format } => Some((name.clone(), format.clone())),
            _ => None,
        })
        .collect();

    Ok(ReadPlan {
        skip_rows: metadata.header_row_index,
        dtype_overrides,
        row_limit: metadata.actual_row_count,
        date_columns,
    })
}

/// Plan for a fac table: only the marker column is typed
pub fn build_table_plan(metadata: &FileMetadata) -> ReadPlan {
    let mut dtype_overrides = BTreeMap::new();
    dtype_overrides.insert(metadata.marker_column().to_string(), ColumnType::Sentinel);

    ReadPlan {
        skip_rows: metadata.header_row_index,
        dtype_overrides,
        row_limit: metadata.actual_row_count,
        date_columns: BTreeMap::new(),
    }
}

/// Read the planned rows of `text` into a typed dataframe
///
/// Rows whose field count does not match the header are skipped and
/// reported as [`MpfWarning::BadDataRow`].
pub fn read_frame(
    text: &str,
    plan: &ReadPlan,
    metadata: &FileMetadata,
) -> Result<(DataFrame, Vec<MpfWarning>)> {
    let (csv, warnings) = select_rows(text, plan, metadata)?;

    let mut schema_overwrite = Schema::default();
    for (name, dtype) in plan.reader_dtypes() {
        schema_overwrite.with_column(name.into(), dtype);
    }

    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_ignore_errors(true)
        .with_schema_overwrite(Some(Arc::new(schema_overwrite)));

    let frame = CsvReader::new(Cursor::new(csv.into_bytes()))
        .with_options(options)
        .finish()?;

    let frame = parse_dates(frame, &plan.date_columns)?;
    Ok((frame, warnings))
}

/// Header line plus the data lines the plan admits, as CSV text
fn select_rows(
    text: &str,
    plan: &ReadPlan,
    metadata: &FileMetadata,
) -> Result<(String, Vec<MpfWarning>)> {
    let mut lines = text.lines().enumerate().skip(plan.skip_rows);
    let Some((_, header)) = lines.next() else {
        return Err(MpfError::malformed(
            &metadata.path,
            "header row is past the end of the file",
        ));
    };

    let column_count = metadata.column_names.len();
    let mut csv = String::with_capacity(text.len());
    csv.push_str(header.trim_end());
    csv.push('\n');

    let mut warnings = Vec::new();
    let mut taken = 0;
    for (line_num, line) in lines {
        if !line.starts_with(SENTINEL) {
            if taken > 0 {
                break;
            }
            continue;
        }
        if taken == plan.row_limit {
            break;
        }
        taken += 1;

        let fields = count_fields(line);
        if fields != column_count {
            let warning = MpfWarning::BadDataRow {
                line: line_num,
                reason: format!("expected {} fields, found {}", column_count, fields),
            };
            warn!("{} in: {}", warning, metadata.path.display());
            warnings.push(warning);
            continue;
        }

        csv.push_str(line);
        csv.push('\n');
    }

    Ok((csv, warnings))
}

/// Number of comma-separated fields, honouring double quotes
fn count_fields(line: &str) -> usize {
    let mut fields = 1;
    let mut in_quotes = false;
    for ch in line.trim_end().chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields += 1,
            _ => {}
        }
    }
    fields
}

fn parse_dates(frame: DataFrame, date_columns: &BTreeMap<String, String>) -> Result<DataFrame> {
    if date_columns.is_empty() {
        return Ok(frame);
    }

    let conversions: Vec<Expr> = date_columns
        .iter()
        .filter(|(name, _)| frame.get_column_index(name.as_str()).is_some())
        .map(|(name, format)| {
            col(name.as_str()).str().to_date(StrptimeOptions {
                format: Some(format.as_str().into()),
                strict: false,
                ..Default::default()
            })
        })
        .collect();

    Ok(frame.lazy().with_columns(conversions).collect()?)
}
