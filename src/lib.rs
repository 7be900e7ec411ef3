//! MPF Processor Library
//!
//! Reads and writes actuarial model point files (MPF): comma-separated text
//! files with an optional metadata block (`OUTPUT_FORMAT`, `NUMLINES`,
//! `VARIABLE_TYPES`), a header row starting with `!` (or `&` for result
//! files) and data rows starting with `*`.
//!
//! This library provides tools for:
//! - Scanning file headers in one forward pass ([`header`])
//! - Decoding and encoding column type codes ([`schema`])
//! - Loading files into polars dataframes with their declared types
//! - Loading fac reference tables and their composite keys
//! - Exporting dataframes back to one MPF file per product

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod header;
pub mod models;
pub mod processor;
pub mod schema;

// Re-export commonly used types
pub use config::MpfConfig;
pub use error::{MpfError, MpfWarning, Result};
pub use header::{scan, scan_file};
pub use models::{FacTable, FileMetadata, LoadedFiles, LoadedMpf, ReadPlan, ScanMode};
pub use processor::writer::{ExportOptions, export, write_parquet};
pub use processor::{load_files, load_files_with_formats, read_fac, read_mpf};
pub use schema::{ColumnType, encode_column, infer_column_type};
