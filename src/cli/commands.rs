//! Command implementations for the PCR export processor CLI
//!
//! Configuration loading, logging setup and the runners behind the watch,
//! process and validate subcommands.

use crate::app::models::{FileOutcome, WatchStats};
use crate::app::services::pipeline::Pipeline;
use crate::app::services::watcher::FolderWatcher;
use crate::cli::args::{Args, Commands, ValidateArgs};
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

/// Main command runner
pub async fn run(args: Args, token: CancellationToken) -> Result<()> {
    let (config, config_found) = load_configuration(&args.config)?;

    let level = args
        .command
        .log_level_override()
        .map(str::to_string)
        .unwrap_or_else(|| config.logging.level.clone());
    let _guard = setup_logging(&level, &config)?;

    if config_found {
        debug!("Configuration loaded from {}", args.config.display());
    } else {
        info!(
            "Configuration file {} not found, using built-in defaults",
            args.config.display()
        );
    }

    match args.command {
        Commands::Watch(_) => run_watch(config, token).await,
        Commands::Process(ref process_args) => run_process(config, !process_args.quiet),
        Commands::Validate(ref validate_args) => run_validate(config, validate_args),
    }
}

/// Load the TOML configuration, falling back to defaults when the file is
/// absent
fn load_configuration(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        Ok((Config::load(path)?, true))
    } else {
        let config = Config::default();
        config.validate()?;
        Ok((config, false))
    }
}

/// Set up tracing with a stderr layer and, when configured, a log file
///
/// The returned guard must stay alive for the file writer to flush.
fn setup_logging(level: &str, config: &Config) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pcr_processor={}", level)));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.logging.file {
        Some(file) => {
            fs::create_dir_all(config.log_dir())?;
            let appender = tracing_appender::rolling::never(config.log_dir(), file);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

/// Run the continuous watch loop until the token cancels
async fn run_watch(config: Config, token: CancellationToken) -> Result<()> {
    config.ensure_directories()?;
    info!("Starting folder watcher");
    let watcher = FolderWatcher::new(Pipeline::new(config)?);
    let stats = watcher.watch(token).await?;
    print_summary(&stats);
    Ok(())
}

/// Drain the inbound directory once with progress reporting
fn run_process(config: Config, show_progress: bool) -> Result<()> {
    config.ensure_directories()?;
    let watcher = FolderWatcher::new(Pipeline::new(config)?);
    let files = watcher.scan()?;

    if files.is_empty() {
        println!("{}", "No matching files in the inbound directory".yellow());
        return Ok(());
    }

    let progress = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut stats = WatchStats::default();
    for file in files {
        if let Some(pb) = &progress {
            if let Some(name) = file.file_name() {
                pb.set_message(name.to_string_lossy().into_owned());
            }
        }
        match watcher.pipeline().handle_file(&file)? {
            FileOutcome::Processed(_) => stats.files_processed += 1,
            FileOutcome::Quarantined { .. } => stats.files_quarantined += 1,
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    print_summary(&stats);
    Ok(())
}

/// Parse and normalize one export, report what the pipeline would see
fn run_validate(config: Config, args: &ValidateArgs) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let records = pipeline.inspect_file(&args.file)?;

    println!("{}", "Export OK".bright_green().bold());
    println!("  {} {}", "File:".bright_cyan(), args.file.display());
    if let Some(first) = records.first() {
        println!(
            "  {} {}",
            "Instrument:".bright_cyan(),
            first.metadata.instrument_type
        );
        println!(
            "  {} {}",
            "Run end:".bright_cyan(),
            first.field("run_end_time")
        );
    }
    println!("  {} {}", "Rows:".bright_cyan(), records.len());

    let mut test_numbers: Vec<&str> = Vec::new();
    for record in &records {
        let tn = record.row.test_number.as_str();
        if !tn.is_empty() && !test_numbers.contains(&tn) {
            test_numbers.push(tn);
        }
    }
    println!(
        "  {} {}",
        "Test numbers:".bright_cyan(),
        if test_numbers.is_empty() {
            "none".to_string()
        } else {
            test_numbers.join(", ")
        }
    );

    let without = records.iter().filter(|r| !r.row.has_test_number()).count();
    if without > 0 {
        println!(
            "  {} {} row(s) without test number (analysis artifact only)",
            "Note:".yellow(),
            without
        );
    }
    Ok(())
}

fn print_summary(stats: &WatchStats) {
    println!("{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_quarantined > 0 {
        println!(
            "  {} {}",
            "Files quarantined:".bright_red(),
            stats.files_quarantined.to_string().bright_red().bold()
        );
    }
}
