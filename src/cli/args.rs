//! Command-line argument definitions for the PCR export processor
//!
//! Defines the CLI interface using the clap derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the PCR export processor
///
/// Watches a PCR instrument export folder, normalizes qPCR result files and
/// generates the warehouse, analysis, LIMS import and LIMSML artifacts.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pcr-processor",
    version,
    about = "Normalize PCR instrument exports and generate LIMS artifacts",
    long_about = "Ingests tab-delimited export files from the lab's PCR instruments, \
                  normalizes them into one canonical schema and fans the data out to \
                  analysis, warehouse and LIMS import artifacts plus a LIMSML document. \
                  Malformed files are quarantined, the watch loop never stops for one \
                  bad file.",
    arg_required_else_help = true
)]
pub struct Args {
    /// Path to the TOML configuration file. Built-in defaults apply when
    /// the file does not exist.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        default_value = "pcr-processor.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Watch the inbound directory and process exports continuously
    Watch(WatchArgs),
    /// Process everything currently in the inbound directory, then exit
    Process(ProcessArgs),
    /// Parse and normalize one export without writing or moving anything
    Validate(ValidateArgs),
}

/// Arguments for the watch command (the service loop)
#[derive(Debug, Clone, Parser)]
pub struct WatchArgs {
    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Arguments for the one-shot process command
#[derive(Debug, Clone, Parser)]
pub struct ProcessArgs {
    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Arguments for the validate command
#[derive(Debug, Clone, Parser)]
pub struct ValidateArgs {
    /// Export file to check
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Map the shared verbosity flags onto a log level override
///
/// Returns None when neither flag is set, letting the configured level win.
pub fn log_level_override(verbose: u8, quiet: bool) -> Option<&'static str> {
    if quiet {
        return Some("error");
    }
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

impl Commands {
    /// Effective log level override for this invocation
    pub fn log_level_override(&self) -> Option<&'static str> {
        match self {
            Commands::Watch(args) => log_level_override(args.verbose, args.quiet),
            Commands::Process(args) => log_level_override(args.verbose, args.quiet),
            Commands::Validate(args) => log_level_override(args.verbose, false),
        }
    }
}
