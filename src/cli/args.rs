//! Command-line argument definitions for the MPF processor
//!
//! clap derive API: global options on [`Args`], one struct per subcommand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the model point file processor
///
/// Loads actuarial model point files (and fac reference tables) into
/// dataframes, and exports dataframes back to the MPF text format.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mpf_processor",
    version,
    about = "Read and write actuarial model point files",
    long_about = "Scans model point file headers, loads the data rows with their declared \
                  column types, and writes dataframes back out as one MPF file per product \
                  with a regenerated VARIABLE_TYPES line."
)]
pub struct Args {
    /// Config file (defaults to mpfi_config.json in the working directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print the scanned header metadata of one file
    Inspect(InspectArgs),
    /// Load model point files and summarise (or save) the combined table
    Load(LoadArgs),
    /// Load a fac reference table
    Fac(FacArgs),
    /// Load model point files and write them back out
    Export(ExportArgs),
    /// Write the default config file
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct InspectArgs {
    /// File to scan
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Scan as a fac table (`!N` header, type lines ignored)
    #[arg(long)]
    pub table: bool,
}

/// Which model point files to read
#[derive(Debug, Clone, Parser)]
pub struct SourceArgs {
    /// File name or glob pattern; the configured extension is appended when missing
    #[arg(value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Folder to search instead of the configured ones
    #[arg(long, value_name = "DIR", conflicts_with = "filter")]
    pub folder: Option<PathBuf>,

    /// Pick the first configured folder whose path contains every filter
    #[arg(long, value_name = "TEXT", num_args = 1..)]
    pub filter: Vec<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write the combined table to a Parquet file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Rows to preview
    #[arg(long, default_value_t = 10)]
    pub head: usize,
}

#[derive(Debug, Clone, Parser)]
pub struct FacArgs {
    /// Table name, with or without extension
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Folder to search instead of the configured ones
    #[arg(long, value_name = "DIR")]
    pub folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Destination folder (split mode) or file stem (single-file mode)
    #[arg(short, long, value_name = "DEST")]
    pub output: PathBuf,

    /// Write all products to one file with a product column
    #[arg(long)]
    pub single_file: bool,

    /// Omit the OUTPUT_FORMAT, NUMLINES and VARIABLE_TYPES lines
    #[arg(long)]
    pub no_header: bool,

    /// Replace existing output files
    #[arg(short, long)]
    pub force: bool,

    /// Export a column that does not follow the upper-case naming rule
    #[arg(long, value_name = "COLUMN")]
    pub include: Vec<String>,

    /// Leave a column out of the export
    #[arg(long, value_name = "COLUMN")]
    pub exclude: Vec<String>,

    /// Sort rows by these columns
    #[arg(long, value_name = "COLUMN")]
    pub sort_by: Vec<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct InitConfigArgs {
    /// Overwrite an existing config file
    #[arg(short, long)]
    pub force: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args() {
        let args = Args::parse_from([
            "mpf_processor",
            "export",
            "TERM*",
            "--filter",
            "2024",
            "Q4",
            "--output",
            "out",
            "--single-file",
            "--exclude",
            "NAME",
            "--sort-by",
            "POLICY_NUMBER",
        ]);

        match args.command {
            Commands::Export(export) => {
                assert_eq!(export.source.pattern.as_deref(), Some("TERM*"));
                assert_eq!(export.source.filter, vec!["2024", "Q4"]);
                assert_eq!(export.output, PathBuf::from("out"));
                assert!(export.single_file);
                assert!(!export.force);
                assert_eq!(export.exclude, vec!["NAME"]);
                assert_eq!(export.sort_by, vec!["POLICY_NUMBER"]);
            }
            other => panic!("Expected export command, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["mpf_processor", "inspect", "A.PRO", "-v", "--config", "c.json"]);

        assert!(args.verbose);
        assert_eq!(args.get_log_level(), "debug");
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn test_folder_conflicts_with_filter() {
        let result = Args::try_parse_from([
            "mpf_processor",
            "load",
            "--folder",
            "x",
            "--filter",
            "y",
        ]);
        assert!(result.is_err());
    }
}
