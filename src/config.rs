//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trustscope.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".trustscope.toml";

/// Upper bound for the progress tick interval.
const MAX_PROGRESS_TICK_MS: u64 = 60_000;

/// Upper bound for how long the completed state stays on screen.
const MAX_DISPLAY_DELAY_MS: u64 = 60_000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Upload progress settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "trustscope_report.md".to_string()
}

/// Remote analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Analysis endpoint receiving the multipart upload.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds. Unset waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/analyze".to_string()
}

/// Synthetic progress and completion timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Milliseconds between progress steps.
    #[serde(default = "default_tick_ms")]
    pub progress_tick_ms: u64,

    /// Largest single progress step.
    #[serde(default = "default_max_increment")]
    pub progress_max_increment: f64,

    /// Value the animation stops at while waiting. Must stay below 100.
    #[serde(default = "default_ceiling")]
    pub progress_ceiling: f64,

    /// Milliseconds the completed state stays visible before the report.
    #[serde(default = "default_display_delay_ms")]
    pub display_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            progress_tick_ms: default_tick_ms(),
            progress_max_increment: default_max_increment(),
            progress_ceiling: default_ceiling(),
            display_delay_ms: default_display_delay_ms(),
        }
    }
}

fn default_tick_ms() -> u64 {
    120
}

fn default_max_increment() -> f64 {
    12.0
}

fn default_ceiling() -> f64 {
    95.0
}

fn default_display_delay_ms() -> u64 {
    600
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the weekly chart-series table.
    #[serde(default = "default_true")]
    pub include_chart_table: bool,

    /// Include the advanced analysis section when the service provides it.
    #[serde(default = "default_true")]
    pub include_advanced: bool,

    /// Width of the text risk meter in characters.
    #[serde(default = "default_meter_width")]
    pub meter_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_chart_table: true,
            include_advanced: true,
            meter_width: default_meter_width(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_meter_width() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.service.endpoint = endpoint.clone();
        }

        if let Some(timeout) = args.timeout {
            self.service.timeout_seconds = Some(timeout);
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check settings that would break the upload lifecycle.
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.service.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("Service endpoint must start with 'http://' or 'https://'");
        }

        if self.service.timeout_seconds == Some(0) {
            bail!("Timeout must be at least 1 second");
        }

        let upload = &self.upload;
        if upload.progress_tick_ms == 0 || upload.progress_tick_ms > MAX_PROGRESS_TICK_MS {
            bail!(
                "progress_tick_ms must be between 1 and {}",
                MAX_PROGRESS_TICK_MS
            );
        }
        let increment = upload.progress_max_increment;
        if !increment.is_finite() || increment <= 0.0 || increment > 100.0 {
            bail!("progress_max_increment must be a finite number in (0, 100]");
        }
        let ceiling = upload.progress_ceiling;
        if !ceiling.is_finite() || ceiling <= 0.0 || ceiling >= 100.0 {
            bail!("progress_ceiling must be between 0 and 100 (exclusive)");
        }
        if upload.display_delay_ms > MAX_DISPLAY_DELAY_MS {
            bail!(
                "display_delay_ms must be at most {}",
                MAX_DISPLAY_DELAY_MS
            );
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
