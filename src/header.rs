//! Model point file header scanning and metadata extraction.
//!
//! A single forward pass over the file recovers the column header row, the
//! declared (`NUMLINES`) and actual data row counts and the per-column type
//! codes (`VARIABLE_TYPES`). The result drives the CSV reader with the right
//! skip_rows, row limit and dtype overrides.

use crate::constants::{
    MODEL_POINT_HEADER_MARKER, NUMLINES_TAG, RESULT_HEADER_MARKER, SENTINEL, VARIABLE_TYPES_TAG,
};
use crate::error::{MpfError, MpfWarning, Result};
use crate::models::{FileMetadata, ScanMode};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static NUMLINES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{},\s*(\d+)", NUMLINES_TAG)).expect("valid NUMLINES pattern")
});

/// Scan a file on disk
pub fn scan_file(file_path: &Path, mode: ScanMode) -> Result<FileMetadata> {
    let file = File::open(file_path).map_err(MpfError::Io)?;
    scan(BufReader::new(file), file_path, mode)
}

/// Scan any buffered source; `source` is only used in diagnostics
pub fn scan<R: BufRead>(mut reader: R, source: &Path, mode: ScanMode) -> Result<FileMetadata> {
    let mut builder = MetadataBuilder::new(mode);
    let mut buffer = Vec::new();
    let mut line_num = 0;

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).map_err(MpfError::Io)? == 0 {
            break;
        }
        let line = decode_line(&buffer);

        if builder.parse_line(line_num, &line) == ScanState::Finished {
            debug!(
                "Data rows ended at line {} of {}",
                line_num,
                source.display()
            );
            break;
        }
        line_num += 1;
    }

    let metadata = builder.build(source)?;

    debug!(
        "Scanned {}: header_row={}, rows={}, declared={:?}, typed={}",
        source.display(),
        metadata.header_row_index,
        metadata.actual_row_count,
        metadata.declared_row_count,
        metadata.column_type_codes.is_some()
    );

    Ok(metadata)
}

/// Decode one line of text, falling back to Latin-1 for legacy bytes
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}

/// Whether scanning should continue after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Finished,
}

/// Accumulator threaded through the scan
struct MetadataBuilder {
    mode: ScanMode,
    declared_row_count: Option<usize>,
    type_codes: Option<Vec<String>>,
    header: Option<(usize, Vec<String>)>,
    data_rows: usize,
}

impl MetadataBuilder {
    fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            declared_row_count: None,
            type_codes: None,
            header: None,
            data_rows: 0,
        }
    }

    fn parse_line(&mut self, line_num: usize, line: &str) -> ScanState {
        if line.starts_with(SENTINEL) {
            self.data_rows += 1;
            return ScanState::Scanning;
        }

        // Anything else once data has started is a trailing footer
        if self.data_rows > 0 {
            return ScanState::Finished;
        }

        if self.mode == ScanMode::ModelPoint {
            if let Some(captures) = NUMLINES_PATTERN.captures(line) {
                self.declared_row_count = captures[1].parse().ok();
                return ScanState::Scanning;
            }

            if let Some(codes) = strip_tag(line, VARIABLE_TYPES_TAG) {
                self.type_codes = Some(
                    codes
                        .trim_end()
                        .split(',')
                        .map(|code| code.trim().to_string())
                        .collect(),
                );
                return ScanState::Scanning;
            }
        }

        if self.header.is_none() && self.is_header_line(line) {
            let names = line
                .trim_end()
                .split(',')
                .map(str::to_string)
                .collect();
            self.header = Some((line_num, names));
        }

        ScanState::Scanning
    }

    fn is_header_line(&self, line: &str) -> bool {
        match self.mode {
            ScanMode::ModelPoint => {
                line.starts_with([MODEL_POINT_HEADER_MARKER, RESULT_HEADER_MARKER])
            }
            ScanMode::Table => line.starts_with(MODEL_POINT_HEADER_MARKER),
        }
    }

    fn build(self, file_path: &Path) -> Result<FileMetadata> {
        let (header_row_index, column_names) = self.header.ok_or_else(|| {
            MpfError::malformed(file_path, "no column header row starting with '!' or '&'")
        })?;

        if self.data_rows == 0 {
            return Err(MpfError::malformed(
                file_path,
                "no data rows starting with '*'",
            ));
        }

        if let Some(codes) = &self.type_codes {
            if codes.len() != column_names.len() {
                return Err(MpfError::malformed(
                    file_path,
                    format!(
                        "variable_types column count mismatch: {} types for {} columns",
                        codes.len(),
                        column_names.len()
                    ),
                ));
            }
        }

        let mut warnings = Vec::new();
        if let Some(declared) = self.declared_row_count {
            if declared != self.data_rows {
                warn!(
                    "Actual lines loaded ({}) different from NUMLINES ({}) in: {}",
                    self.data_rows,
                    declared,
                    file_path.display()
                );
                warnings.push(MpfWarning::RowCountMismatch {
                    declared,
                    actual: self.data_rows,
                });
            }
        }

        let date_columns: BTreeSet<String> = match &self.type_codes {
            Some(codes) => column_names
                .iter()
                .zip(codes)
                .filter(|(_, code)| code.starts_with('D'))
                .map(|(name, _)| name.clone())
                .collect(),
            None => BTreeSet::new(),
        };

        Ok(FileMetadata {
            path: file_path.to_path_buf(),
            header_row_index,
            declared_row_count: self.declared_row_count,
            actual_row_count: self.data_rows,
            column_names,
            column_type_codes: self.type_codes,
            date_columns,
            warnings,
        })
    }
}

/// Remainder of `line` after `TAG,`
fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag)?.strip_prefix(',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn scan_text(text: &str) -> Result<FileMetadata> {
        scan(
            Cursor::new(text.as_bytes()),
            Path::new("test.PRO"),
            ScanMode::ModelPoint,
        )
    }

    #[test]
    fn test_full_header_block() {
        let metadata = scan_text(
            "OUTPUT_FORMAT, mpfi\n\
             NUMLINES, 2\n\
             VARIABLE_TYPES,V,T3,I,D%Y%m%d\n\
             !,NAME,AGE,DOB\n\
             *,\"ABC\",30,20200101\n\
             *,\"DE\",41,19991231\n",
        )
        .unwrap();

        assert_eq!(metadata.header_row_index, 3);
        assert_eq!(metadata.declared_row_count, Some(2));
        assert_eq!(metadata.actual_row_count, 2);
        assert_eq!(metadata.column_names, vec!["!", "NAME", "AGE", "DOB"]);
        assert_eq!(
            metadata.column_type_codes,
            Some(vec![
                "V".to_string(),
                "T3".to_string(),
                "I".to_string(),
                "D%Y%m%d".to_string()
            ])
        );
        assert_eq!(
            metadata.date_columns.iter().collect::<Vec<_>>(),
            vec!["DOB"]
        );
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_header_index_without_marker_lines() {
        let metadata = scan_text("some title\n\nNAME LIST\n!,NAME\n*,\"A\"\n");
        // header is the first line starting with '!' (0-indexed 3 here)
        assert_eq!(metadata.unwrap().header_row_index, 3);

        let metadata = scan_text("title\nsubtitle\n!,NAME\n*,\"A\"\n").unwrap();
        assert_eq!(metadata.header_row_index, 2);
    }

    #[test]
    fn test_result_file_header() {
        let metadata = scan_text("&,VALUE\n*,1.5\n").unwrap();
        assert_eq!(metadata.header_row_index, 0);
        assert_eq!(metadata.column_names, vec!["&", "VALUE"]);
        assert_eq!(metadata.column_type_codes, None);
    }

    #[test]
    fn test_only_first_header_counts() {
        let metadata = scan_text("!,A,B\n!,C\n*,1,2\n").unwrap();
        assert_eq!(metadata.header_row_index, 0);
        assert_eq!(metadata.column_names, vec!["!", "A", "B"]);
    }

    #[test]
    fn test_row_count_mismatch_is_a_warning() {
        let metadata =
            scan_text("NUMLINES, 5\n!,A\n*,1\n*,2\n*,3\n*,4\n").unwrap();

        assert_eq!(metadata.declared_row_count, Some(5));
        assert_eq!(metadata.actual_row_count, 4);
        assert_eq!(
            metadata.warnings,
            vec![MpfWarning::RowCountMismatch {
                declared: 5,
                actual: 4
            }]
        );
    }

    #[test]
    fn test_last_numlines_wins() {
        let metadata = scan_text("NUMLINES,9\nNUMLINES,   1\n!,A\n*,1\n").unwrap();
        assert_eq!(metadata.declared_row_count, Some(1));
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_non_numeric_numlines_is_absent() {
        let metadata = scan_text("NUMLINES, many\n!,A\n*,1\n").unwrap();
        assert_eq!(metadata.declared_row_count, None);
        assert!(metadata.warnings.is_empty());
    }

    #[test]
    fn test_trailing_footer_is_not_counted() {
        let metadata = scan_text("!,A\n*,1\n*,2\nEND OF FILE\n*,3\n").unwrap();
        assert_eq!(metadata.actual_row_count, 2);
    }

    #[test]
    fn test_type_count_mismatch_is_malformed() {
        let result = scan_text("VARIABLE_TYPES,V,T3,I\n!,NAME,AGE,SEX\n*,\"A\",1,\"M\"\n");
        match result {
            Err(MpfError::MalformedFile { reason, .. }) => {
                assert!(reason.contains("variable_types column count mismatch"))
            }
            other => panic!("Expected MalformedFile, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let result = scan_text("VARIABLE_TYPES,V,I\n*,1\n");
        match result {
            Err(MpfError::MalformedFile { path, .. }) => {
                assert_eq!(path, Path::new("test.PRO"))
            }
            other => panic!("Expected MalformedFile, got {:?}", other),
        }
    }

    #[test]
    fn test_no_data_rows_is_malformed() {
        assert!(matches!(
            scan_text("!,A,B\n"),
            Err(MpfError::MalformedFile { .. })
        ));
    }

    #[test]
    fn test_table_mode_ignores_result_marker() {
        let metadata = scan(
            Cursor::new("&,X\n!2,KEY1,KEY2,RATE\n*,1,2,0.5\n".as_bytes()),
            Path::new("rates.fac"),
            ScanMode::Table,
        )
        .unwrap();

        assert_eq!(metadata.header_row_index, 1);
        assert_eq!(metadata.composite_key_width().unwrap(), 2);
    }

    #[test]
    fn test_latin1_lines_are_tolerated() {
        let mut bytes = b"\xA9 Copyright\n!,NAME\n".to_vec();
        bytes.extend_from_slice(b"*,\"Jos\xE9\"\n");

        let metadata = scan(
            Cursor::new(bytes),
            Path::new("legacy.PRO"),
            ScanMode::ModelPoint,
        )
        .unwrap();
        assert_eq!(metadata.header_row_index, 1);
        assert_eq!(metadata.actual_row_count, 1);
        assert_eq!(decode_line(b"Jos\xE9"), "José");
    }

    #[test]
    fn test_scan_file_from_disk() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "VARIABLE_TYPES,V,I").unwrap();
        writeln!(temp_file, "!,AGE").unwrap();
        writeln!(temp_file, "*,30").unwrap();

        let metadata = scan_file(temp_file.path(), ScanMode::ModelPoint).unwrap();
        assert_eq!(metadata.path, temp_file.path());
        assert_eq!(metadata.header_row_index, 1);
        assert_eq!(metadata.actual_row_count, 1);
    }
}
