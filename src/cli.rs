//! CLI argument parsing for trace-ingest

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for classified events
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "trace-ingest")]
#[command(version)]
#[command(about = "Classify and link kernel/GPU trace events for timeline viewers", long_about = None)]
pub struct Cli {
    /// Trace capture (JSON lines)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show a summary table instead of individual events
    #[arg(short = 'c', long = "summary")]
    pub summary: bool,

    /// Filter events (e.g., -e event=gpu or -e event=/^drm_/,!sched_switch)
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    pub filter: Option<String>,

    /// Stop after N events
    #[arg(short = 'n', long = "limit", value_name = "N")]
    pub limit: Option<u64>,

    /// Include raw event fields in text and CSV output
    #[arg(long = "fields")]
    pub fields: bool,

    /// Reader configuration file (TOML)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Abort on the first malformed record instead of skipping it
    #[arg(long = "strict")]
    pub strict: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
