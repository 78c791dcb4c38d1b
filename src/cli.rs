//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::RiskLevel;
use clap::Parser;
use std::path::PathBuf;

/// TrustScope - human-AI trust analytics from decision logs
///
/// Uploads a CSV of human/model decisions to the TrustScope analysis
/// service and renders trust metrics, risk scores and the executive
/// summary as a Markdown or JSON dashboard.
///
/// The CSV needs the columns: date, model_decision, human_decision,
/// confidence_note.
///
/// Examples:
///   trustscope --file decisions.csv
///   trustscope --file decisions.csv --endpoint http://analysis.local:8000/analyze
///   trustscope --file decisions.csv --format json --output dashboard.json
///   trustscope --file decisions.csv --fail-on high
///   trustscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV file of decision records to analyze
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub file: Option<PathBuf>,

    /// Analysis service endpoint URL
    ///
    /// Can also be set via TRUSTSCOPE_ENDPOINT or .trustscope.toml.
    #[arg(long, value_name = "URL", env = "TRUSTSCOPE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    ///
    /// Without this (or a config value) the upload waits indefinitely
    /// for the service to answer.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trustscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: validate the file and show the target without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Ask whether to try again after a failed upload
    #[arg(long)]
    pub retry_prompt: bool,

    /// Fail if the trust-failure risk is at or above this level
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is reached.
    /// Values: high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Generate a default .trustscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
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

/// Risk level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
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

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.retry_prompt && self.quiet {
            return Err("Cannot use --retry-prompt with --quiet".to_string());
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

    /// Whether the report should fail the run at the given risk score.
    ///
    /// `low` trips on any non-zero risk; `medium` and `high` compare the
    /// score's risk band.
    pub fn exceeds_fail_threshold(&self, risk_score: u8) -> bool {
        let level = RiskLevel::from_score(risk_score);
        match self.fail_on {
            None => false,
            Some(FailOnLevel::Low) => risk_score > 0,
            Some(FailOnLevel::Medium) => level >= RiskLevel::Medium,
            Some(FailOnLevel::High) => level >= RiskLevel::High,
        }
    }
}
