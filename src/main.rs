use anyhow::Result;
use clap::Parser;
use fuzzy_clahe::batch::BatchDriver;
use fuzzy_clahe::config::AppConfig;
use fuzzy_clahe::errors::error_logging;
use fuzzy_clahe::fuzzy::DefuzzMethod;
use fuzzy_clahe::observability;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

/// Exit status when the batch ran but some files failed.
const EXIT_FILE_FAILURES: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "fuzzy-clahe")]
#[command(
    about = "Enhance grayscale radiographs with CLAHE and fuzzy contrast control, mirroring a directory tree"
)]
#[command(version)]
struct Cli {
    /// Root of the tree to process.
    source: PathBuf,

    /// Root of the mirrored output tree.
    dest: PathBuf,

    /// Side of the square working image in pixels.
    #[arg(long)]
    size: Option<u32>,

    /// CLAHE clip limit.
    #[arg(long)]
    clip_limit: Option<f32>,

    /// Number of CLAHE tile columns.
    #[arg(long)]
    tile_cols: Option<u32>,

    /// Number of CLAHE tile rows.
    #[arg(long)]
    tile_rows: Option<u32>,

    /// Global contrast constant of the contrast-control law.
    #[arg(long)]
    contrast: Option<f64>,

    /// Concurrent file workers (0 = one per CPU).
    #[arg(long)]
    workers: Option<usize>,

    /// Defuzzification method: centroid, bisector, mom, som or lom.
    #[arg(long)]
    defuzz: Option<DefuzzMethod>,

    /// Path to write the batch report (JSON).
    #[arg(long)]
    report: Option<PathBuf>,

    /// List planned actions without touching the filesystem.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Command-line flags take precedence over environment values.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(size) = self.size {
            config.enhancement.size = size;
        }
        if let Some(clip_limit) = self.clip_limit {
            config.enhancement.clip_limit = clip_limit;
        }
        if let Some(cols) = self.tile_cols {
            config.enhancement.tile_grid.0 = cols;
        }
        if let Some(rows) = self.tile_rows {
            config.enhancement.tile_grid.1 = rows;
        }
        if let Some(contrast) = self.contrast {
            config.enhancement.contrast_constant = contrast;
        }
        if let Some(method) = self.defuzz {
            config.enhancement.defuzz_method = method;
        }
        if let Some(workers) = self.workers {
            config.batch.workers = workers;
        }
        if let Some(report) = &self.report {
            config.batch.report_path = Some(report.clone());
        }
        if self.dry_run {
            config.batch.dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    cli.apply_to(&mut config);

    // Initialize observability before validating the rest so errors are logged
    let metrics_handle = observability::init_observability_with_config(&config.observability)?;

    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "app_config", "startup_validation");
        return Err(e.into());
    }
    info!("{}", config.summary());

    let driver = BatchDriver::new(&config);

    // Ctrl-C stops the batch between files; in-flight files complete
    let cancel = driver.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight files");
            cancel.cancel();
        }
    });

    let report = driver.run(&cli.source, &cli.dest).await?;

    if let Some(path) = &config.batch.report_path {
        report.write_json(path)?;
    }

    for failure in report.failures() {
        warn!(source = %failure.source.display(), outcome = ?failure.outcome, "File failed");
    }

    info!(
        total = report.total_files(),
        enhanced = report.enhanced,
        relocated = report.relocated,
        failed = report.failed,
        skipped = report.skipped,
        duration_ms = report.duration().as_millis() as u64,
        "Enhancement batch complete"
    );

    observability::finish_observability(metrics_handle.as_ref(), &config.observability)?;

    if report.has_failures() {
        return Ok(ExitCode::from(EXIT_FILE_FAILURES));
    }
    Ok(ExitCode::SUCCESS)
}
