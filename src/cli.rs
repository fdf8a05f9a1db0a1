//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Stress Annotator - experiment groups for plant-stress samples
///
/// Reads the sample sheet, groups samples by study, works out which
/// conditions vary inside each study and writes an experiment group plus
/// up to three differentiating factors back to every sample row.
///
/// Examples:
///   stress-annotator --spreadsheet-id 1AbC...xyz
///   stress-annotator --spreadsheet-id 1AbC...xyz --worksheet Samples --dry-run
///   stress-annotator --local export.csv --output annotated.csv --report report.md
///   stress-annotator --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Google spreadsheet ID
    ///
    /// Can also be set via ANNOTATOR_SPREADSHEET_ID or .annotator.toml.
    #[arg(short, long, value_name = "ID", env = "ANNOTATOR_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Worksheet (tab) title
    #[arg(short, long, value_name = "TITLE", conflicts_with = "worksheet_index")]
    pub worksheet: Option<String>,

    /// Zero-based worksheet (tab) position, used when no title is given
    #[arg(long, value_name = "INDEX")]
    pub worksheet_index: Option<usize>,

    /// Service-account key, or a JSON file holding an OAuth access_token
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// OAuth access token (overrides --credentials)
    #[arg(long, env = "GOOGLE_OAUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Annotate a local CSV export instead of a Google sheet
    ///
    /// Blank lines in the export are not kept in the saved file. Delays
    /// apply only when --initial-delay or --write-delay is given.
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["spreadsheet_id", "worksheet", "worksheet_index"]
    )]
    pub local: Option<PathBuf>,

    /// Where to save the annotated CSV in --local mode
    ///
    /// Defaults to overwriting the --local file.
    #[arg(short, long, value_name = "FILE", requires = "local")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .annotator.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait before the first write
    #[arg(long, value_name = "SECS")]
    pub initial_delay: Option<u64>,

    /// Seconds to wait before each sample's writes
    #[arg(long, value_name = "SECS")]
    pub write_delay: Option<u64>,

    /// Write an annotation report to this file
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Dry run: load and annotate without writing to the sheet
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .annotator.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref id) = self.spreadsheet_id {
            if id.trim().is_empty() || id.contains('/') {
                return Err(
                    "Spreadsheet ID must be the bare ID, not the sheet URL".to_string(),
                );
            }
        }

        if let Some(ref title) = self.worksheet {
            if title.trim().is_empty() {
                return Err("Worksheet title cannot be empty".to_string());
            }
        }

        if let Some(ref local_path) = self.local {
            if !local_path.is_file() {
                return Err(format!(
                    "Local file does not exist: {}",
                    local_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
