//! TrustScope - Human-AI trust analytics client
//!
//! A CLI tool that uploads a decision-record CSV to the TrustScope
//! analysis service and renders the returned trust metrics as a
//! dashboard report.
//!
//! Exit codes:
//!   0 - Success (risk below --fail-on, or no --fail-on set)
//!   1 - Runtime error (config, upload, connection, report write)
//!   2 - Trust-failure risk at or above --fail-on threshold

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod upload;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use models::{AnalysisPayload, DashboardReport, ReportMetadata, REQUIRED_COLUMNS};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use upload::{
    ControllerSettings, HttpAnalysisClient, ServiceSettings, UploadController, UploadFile,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("TrustScope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trustscope.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to customize the endpoint, timeout, and report layout.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Upload the file and write the dashboard report. Returns exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    if config.general.verbose {
        info!("Effective configuration: {:?}", config);
    }

    let path = args
        .file
        .clone()
        .context("No input file given (use --file)")?;
    let file = UploadFile::from_path(path);

    if args.dry_run {
        return handle_dry_run(&file, &config);
    }

    // Step 1: Prepare the upload controller
    let backend = HttpAnalysisClient::new(ServiceSettings::from(&config.service))
        .context("Failed to create HTTP client")?;
    let controller = UploadController::new(
        Arc::new(backend),
        ControllerSettings::from(&config.upload),
    );

    println!("📤 Uploading {}", file.name());
    println!("   Service: {}", controller.endpoint());
    match config.service.timeout_seconds {
        Some(secs) => println!("   Timeout: {}s", secs),
        None => println!("   Timeout: none (waits for the service to answer)"),
    }
    println!();

    // Step 2: Upload and wait for the analysis
    let payload = match upload_with_retry(&controller, &file, &args).await? {
        Some(payload) => payload,
        None => return Ok(1),
    };

    // Step 3: Build the report
    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        file_name: file.name().to_string(),
        endpoint: controller.endpoint().to_string(),
        generated_at: Utc::now(),
        duration_seconds: duration,
    };
    let report = DashboardReport::new(metadata, payload);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = std::path::PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let summary = &report.summary;
    println!("\n📊 Trust Summary:");
    println!(
        "   Average trust score: {:.1}% {}",
        summary.average_trust_score * 100.0,
        summary.trust_trend.arrow()
    );
    println!(
        "   Override rate: {:.1}% {}",
        summary.average_override_rate * 100.0,
        summary.override_trend.arrow()
    );
    println!("   Total decisions: {}", summary.total_decisions);
    println!("   {}", report::risk_headline(summary));
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on threshold
    if args.exceeds_fail_threshold(summary.risk_score) {
        eprintln!(
            "\n⛔ Trust-failure risk is {} (at or above --fail-on). Failing (exit code 2).",
            summary.risk_level
        );
        return Ok(2);
    }

    Ok(0)
}

/// Submit the file, offering a manual retry after failures when asked to.
///
/// Returns `None` when the upload failed and was not retried.
async fn upload_with_retry(
    controller: &UploadController,
    file: &UploadFile,
    args: &Args,
) -> Result<Option<AnalysisPayload>> {
    loop {
        let display = upload::terminal::spawn_progress_display(controller.subscribe(), !args.quiet);
        let result = controller.submit(file.clone()).await;
        if let Err(e) = display.await {
            warn!("Progress display stopped unexpectedly: {}", e);
        }

        match result {
            Ok(payload) => return Ok(Some(payload)),
            Err(e) => {
                eprintln!("\n❌ Upload failed: {}", e);
                debug!("Session after failure: {:?}", controller.snapshot());

                if e == upload::UploadError::InvalidFile {
                    eprintln!("   Expected columns: {}", REQUIRED_COLUMNS.join(", "));
                }

                if args.retry_prompt && e.is_retryable() && prompt_retry().await? {
                    controller.reset();
                    continue;
                }

                return Ok(None);
            }
        }
    }
}

/// Ask the user whether to try the upload again.
async fn prompt_retry() -> Result<bool> {
    print!("↻ Try again? [y/N] ");
    std::io::stdout().flush()?;

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await?
    .context("Failed to read answer")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Handle --dry-run: check the file, print what would be sent, exit.
fn handle_dry_run(file: &UploadFile, config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: validating file (no upload)...\n");
    println!("   File: {}", file.name());

    if let Some(path) = file.path() {
        match std::fs::metadata(path) {
            Ok(meta) => println!("   Size: {} bytes", meta.len()),
            Err(e) => {
                eprintln!("\n❌ Cannot read {}: {}", path.display(), e);
                return Ok(1);
            }
        }
    }

    println!("   Endpoint: {}", config.service.endpoint);
    println!("   Expected columns: {}", REQUIRED_COLUMNS.join(", "));

    if !file.has_csv_extension() {
        eprintln!("\n❌ {}", upload::UploadError::InvalidFile);
        return Ok(1);
    }

    println!("\n✅ Dry run complete. No upload was made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
