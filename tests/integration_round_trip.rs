//! Integration tests for loading and exporting model point files
//!
//! These tests drive the public API end to end: files are discovered in a
//! configured folder, loaded into one table, exported per product and read
//! back.

use mpf_processor::processor::discovery::{file_pattern, find_fac, find_files, resolve_folder};
use mpf_processor::{
    ColumnType, ExportOptions, MpfConfig, MpfError, MpfWarning, ScanMode, export, load_files,
    read_fac, read_mpf, scan_file, write_parquet,
};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TERM_PRO: &str = "\
OUTPUT_FORMAT, mpfi
NUMLINES, 3
VARIABLE_TYPES,V,T4,T2,I,N,D
!,POLICY_NUMBER,SEX,AGE_AT_ENTRY,SUM_ASSURED,ENTRY_DATE
*,\"P003\",\"M\",35,150000.5,\"03/15/2019\"
*,\"P001\",\"F\",28,200000.25,\"11/02/2020\"
*,\"P002\",\"M\",41,75000.75,\"07/30/2018\"
";

// Declares five rows but only holds two, and ends in a summary footer
const WL_PRO: &str = "\
NUMLINES, 5
VARIABLE_TYPES,V,T4,T1,I,N
!,POLICY_NUMBER,SEX,AGE_AT_ENTRY,SUM_ASSURED
*,\"W002\",\"F\",52,50000.5
*,\"W001\",\"M\",60,80000.25
TOTAL,,,,130000.75
";

fn write_model_points(dir: &Path) -> Vec<PathBuf> {
    let folder = dir.join("MPFILES");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("C_TERM.PRO"), TERM_PRO).unwrap();
    fs::write(folder.join("C_WL.PRO"), WL_PRO).unwrap();
    fs::write(folder.join("README.txt"), "not a model point file").unwrap();
    vec![folder.join("C_TERM.PRO"), folder.join("C_WL.PRO")]
}

fn test_config(dir: &Path) -> MpfConfig {
    MpfConfig::default()
        .with_mpf_folders(vec![dir.join("missing"), dir.join("MPFILES")])
        .with_fac_folders(vec![dir.join("TABLES")])
        .without_file_name_column()
}

#[test]
fn test_discover_load_and_export() {
    let temp_dir = TempDir::new().unwrap();
    write_model_points(temp_dir.path());
    let config = test_config(temp_dir.path());

    let folder = resolve_folder(&config.mpf_folders, &["MPF".to_string()]).unwrap();
    let files = find_files(&folder, &file_pattern(Some("C_*"), &config.mpf_extension)).unwrap();
    assert_eq!(files.len(), 2);

    let frame = load_files(&files, &config).unwrap();
    assert_eq!(frame.height(), 5);
    // ENTRY_DATE only exists in the term file
    assert_eq!(frame.column("ENTRY_DATE").unwrap().null_count(), 2);

    let destination = temp_dir.path().join("out");
    let written = export(&frame, &destination, &ExportOptions::default(), &config).unwrap();
    assert_eq!(
        written,
        vec![destination.join("C_TERM.PRO"), destination.join("C_WL.PRO")]
    );

    let term = fs::read_to_string(&written[0]).unwrap();
    let lines: Vec<&str> = term.lines().collect();
    assert_eq!(lines[0], "OUTPUT_FORMAT, mpfi");
    assert_eq!(lines[1], "NUMLINES, 3");
    assert_eq!(lines[2], "VARIABLE_TYPES,V,T4,T1,I,N,D%m/%d/%Y");
    assert_eq!(lines[3], "!,POLICY_NUMBER,SEX,AGE_AT_ENTRY,SUM_ASSURED,ENTRY_DATE");
    assert_eq!(lines[4], "*,\"P001\",\"F\",28,200000.25,\"11/02/2020\"");
    assert_eq!(lines.len(), 7);

    // The footer and the missing rows do not survive the export
    let wl = read_mpf(&written[1], &config).unwrap();
    assert!(wl.warnings.is_empty());
    assert_eq!(wl.metadata.declared_row_count, Some(2));
    let policies: Vec<Option<&str>> = wl
        .frame
        .column("POLICY_NUMBER")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(policies, vec![Some("W001"), Some("W002")]);
}

#[test]
fn test_scan_reports_short_file() {
    let temp_dir = TempDir::new().unwrap();
    let files = write_model_points(temp_dir.path());

    let metadata = scan_file(&files[1], ScanMode::ModelPoint).unwrap();

    assert_eq!(metadata.header_row_index, 2);
    assert_eq!(metadata.actual_row_count, 2);
    assert_eq!(
        metadata.warnings,
        vec![MpfWarning::RowCountMismatch {
            declared: 5,
            actual: 2
        }]
    );
}

#[test]
fn test_fac_lookup_through_config_folders() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let tables = temp_dir.path().join("TABLES");
    fs::create_dir_all(&tables).unwrap();
    fs::write(
        tables.join("MORT.fac"),
        "Mortality by sex and age\n!2,SEX,AGE,QX\n*,M,30,0.001\n*,F,30,0.0008\n",
    )
    .unwrap();

    let path = find_fac("MORT", &config.fac_folders, &config.fac_extension).unwrap();
    let table = read_fac(&path).unwrap();

    assert_eq!(table.key_columns, vec!["SEX", "AGE"]);
    assert!(table.contains_key(&["F", "30"]).unwrap());

    assert!(matches!(
        find_fac("LAPSE", &config.fac_folders, &config.fac_extension),
        Err(MpfError::FileNotFound { .. })
    ));
}

#[test]
fn test_config_file_drives_types() {
    let temp_dir = TempDir::new().unwrap();
    let files = write_model_points(temp_dir.path());
    let config_path = temp_dir.path().join("mpfi_config.json");

    MpfConfig::write_default(&config_path, false).unwrap();
    assert!(matches!(
        MpfConfig::write_default(&config_path, false),
        Err(MpfError::ConfigExists { .. })
    ));

    let config = MpfConfig::from_file(&config_path)
        .unwrap()
        .with_column_spec("SUM_ASSURED", ColumnType::Integer32);
    let loaded = read_mpf(&files[0], &config).unwrap();

    // 150000.5 is not an integer, so it reads as missing
    let sums = loaded.frame.column("SUM_ASSURED").unwrap();
    assert_eq!(sums.dtype(), &DataType::Int32);
    assert_eq!(sums.null_count(), 3);
}

#[test]
fn test_parquet_output() {
    let temp_dir = TempDir::new().unwrap();
    let files = write_model_points(temp_dir.path());
    let config = test_config(temp_dir.path());
    let mut frame = load_files(&files, &config).unwrap();

    let output = temp_dir.path().join("combined.parquet");
    write_parquet(&mut frame, &output).unwrap();

    let reread = ParquetReader::new(fs::File::open(&output).unwrap())
        .finish()
        .unwrap();
    assert!(reread.equals_missing(&frame));
}
