//! Command implementations for the MPF processor CLI
//!
//! Each subcommand resolves its inputs against the loaded [`MpfConfig`],
//! calls into the library and prints a short coloured summary to stdout.
//! Logs go to stderr.

use crate::cli::args::{
    Args, Commands, ExportArgs, FacArgs, InitConfigArgs, InspectArgs, LoadArgs, SourceArgs,
};
use crate::config::MpfConfig;
use crate::header::scan_file;
use crate::models::{FileMetadata, LoadedFiles, ScanMode};
use crate::processor::discovery::{file_pattern, find_fac, find_files, resolve_folder};
use crate::processor::writer::{ExportOptions, export, write_parquet};
use crate::processor::{read_fac, read_mpf};

use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Run the selected subcommand
pub fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config_path = args.config.clone().unwrap_or_else(MpfConfig::default_path);
    let load_config = || {
        MpfConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))
    };

    match &args.command {
        Commands::Inspect(inspect_args) => run_inspect(inspect_args),
        Commands::Load(load_args) => run_load(load_args, &load_config()?),
        Commands::Fac(fac_args) => run_fac(fac_args, &load_config()?),
        Commands::Export(export_args) => run_export(export_args, &load_config()?),
        // init-config must not read the file it is about to write
        Commands::InitConfig(init_args) => run_init_config(init_args, &config_path),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mpf_processor={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let mode = if args.table {
        ScanMode::Table
    } else {
        ScanMode::ModelPoint
    };
    let metadata = scan_file(&args.file, mode)
        .with_context(|| format!("Failed to scan {}", args.file.display()))?;

    print_metadata(&metadata);

    if args.table {
        let width = metadata.composite_key_width()?;
        println!(
            "   • Key columns: {}",
            metadata.column_names[1..=width].join(", ").bright_cyan()
        );
    }
    Ok(())
}

fn print_metadata(metadata: &FileMetadata) {
    println!("{}", metadata.path.display().to_string().bright_green().bold());
    println!("   • Header line: {}", metadata.header_row_index);
    println!("   • Data rows: {}", metadata.actual_row_count);
    match metadata.declared_row_count {
        Some(declared) => println!("   • NUMLINES: {}", declared),
        None => println!("   • NUMLINES: {}", "absent".bright_black()),
    }
    println!("   • Columns: {}", metadata.column_names.len());

    let typed = metadata.typed_columns();
    if typed.is_empty() {
        for name in &metadata.column_names {
            println!("       {}", name.bright_cyan());
        }
    } else {
        for (name, code) in typed {
            println!("       {} {}", name.bright_cyan(), code.bright_black());
        }
    }

    for warning in &metadata.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
}

/// Resolve the model point files selected on the command line
fn resolve_sources(source: &SourceArgs, config: &MpfConfig) -> Result<Vec<PathBuf>> {
    let folder = match &source.folder {
        Some(folder) => folder.clone(),
        None => resolve_folder(&config.mpf_folders, &source.filter)?,
    };
    let pattern = file_pattern(source.pattern.as_deref(), &config.mpf_extension);

    let files = find_files(&folder, &pattern)?;
    if files.is_empty() {
        anyhow::bail!("No files match {} in {}", pattern, folder.display());
    }

    info!("Found {} files in {}", files.len(), folder.display());
    Ok(files)
}

/// Load files one by one behind a progress bar, then concatenate
fn load_with_progress(files: &[PathBuf], config: &MpfConfig) -> Result<LoadedFiles> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut loaded = Vec::with_capacity(files.len());
    for file in files {
        pb.set_message(file.display().to_string());
        loaded.push(
            read_mpf(file, config).with_context(|| format!("Failed to load {}", file.display()))?,
        );
        pb.inc(1);
    }
    pb.finish_and_clear();

    let combined = LoadedFiles::combine(loaded)?;
    if combined.warning_count > 0 {
        println!(
            "{} {} warnings while loading, see log",
            "warning:".yellow().bold(),
            combined.warning_count
        );
    }

    Ok(combined)
}

fn run_load(args: &LoadArgs, config: &MpfConfig) -> Result<()> {
    let start_time = Instant::now();
    let files = resolve_sources(&args.source, config)?;
    let mut frame = load_with_progress(&files, config)?.frame;

    println!(
        "{} {} rows x {} columns from {} files in {}",
        "Loaded".bright_green().bold(),
        frame.height(),
        frame.width(),
        files.len(),
        HumanDuration(start_time.elapsed())
    );
    println!("{}", frame.head(Some(args.head)));

    if let Some(output) = &args.output {
        write_parquet(&mut frame, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("{} {}", "Wrote".bright_green().bold(), output.display());
    }
    Ok(())
}

fn run_fac(args: &FacArgs, config: &MpfConfig) -> Result<()> {
    let folders = match &args.folder {
        Some(folder) => vec![folder.clone()],
        None => config.fac_folders.clone(),
    };
    let path = find_fac(&args.name, &folders, &config.fac_extension)?;
    let table = read_fac(&path).with_context(|| format!("Failed to load {}", path.display()))?;

    println!(
        "{} {} ({} rows)",
        "Loaded".bright_green().bold(),
        path.display(),
        table.frame.height()
    );
    println!("   • Key columns: {}", table.key_columns.join(", ").bright_cyan());
    println!("{}", table.frame.head(Some(10)));
    Ok(())
}

fn run_export(args: &ExportArgs, config: &MpfConfig) -> Result<()> {
    let files = resolve_sources(&args.source, config)?;
    let loaded = load_with_progress(&files, config)?;

    // Dates are written back in the pattern their source file declared
    let options = ExportOptions {
        split_by_product: !args.single_file,
        write_header: !args.no_header,
        include_columns: args.include.clone(),
        exclude_columns: args.exclude.clone(),
        sort_by: args.sort_by.clone(),
        date_formats: loaded.date_formats,
        overwrite: args.force,
    };

    let written = export(&loaded.frame, &args.output, &options, config)
        .with_context(|| format!("Failed to export to {}", args.output.display()))?;

    println!(
        "{} {} files",
        "Exported".bright_green().bold(),
        written.len()
    );
    for path in &written {
        println!("   • {}", path.display());
    }
    Ok(())
}

fn run_init_config(args: &InitConfigArgs, path: &Path) -> Result<()> {
    MpfConfig::write_default(path, args.force)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Created".bright_green().bold(), path.display());
    Ok(())
}
