//! # Batch Driver
//!
//! Walks a source tree and mirrors it into a destination tree. Decodable
//! images are enhanced and written at the mirrored path; every other file is
//! moved there unchanged. Destination paths are derived while planning, before
//! any file task starts, so workers never compute or share paths.
//!
//! Per-file errors are recorded in the [`BatchReport`] and never abort the run.

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, ImageReader};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use walkdir::WalkDir;

use crate::config::{AppConfig, EnhancementConfig};
use crate::errors::{error_logging, AppError, AppResult};
use crate::fuzzy::FuzzyEngine;
use crate::observability;
use crate::path_validation::{is_within, mirror_path, validate_relative_path, PathValidationError};
use crate::pipeline;
use crate::preprocessing::PreprocessingError;

/// Why a file could not be decoded as an image.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The file could not be opened or read
    Open(String),
    /// Neither the content nor the extension names a known image format
    UnknownFormat,
    /// The format is known but the content is malformed or unsupported
    Decode(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Open(msg) => write!(f, "Cannot open file: {}", msg),
            DecodeError::UnknownFormat => write!(f, "Not a recognized image format"),
            DecodeError::Decode(msg) => write!(f, "Image decoding failed: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A successfully decoded image and the format it was stored in.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

fn open_reader(path: &Path) -> Result<ImageReader<io::BufReader<fs::File>>, DecodeError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| DecodeError::Open(e.to_string()))
}

/// Sniff the image format of `path` from its content, then its extension.
pub fn probe_format(path: &Path) -> Result<ImageFormat, DecodeError> {
    open_reader(path)?.format().ok_or(DecodeError::UnknownFormat)
}

/// Decode `path` as an image.
///
/// Zero-byte, truncated and unsupported files all end up as a
/// [`DecodeError`]; the batch driver relocates them instead of enhancing.
pub fn try_decode(path: &Path) -> Result<DecodedImage, DecodeError> {
    let reader = open_reader(path)?;
    let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
    let image = reader
        .decode()
        .map_err(|e| DecodeError::Decode(e.to_string()))?;
    Ok(DecodedImage { image, format })
}

/// Errors of a single file task.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Reading, writing or moving a file failed
    Io { path: PathBuf, message: String },
    /// The destination path could not be derived
    Path(PathValidationError),
    /// The enhancement pipeline rejected the image
    Processing(PreprocessingError),
    /// The enhanced image could not be encoded
    Encode { path: PathBuf, message: String },
    /// The file task panicked
    Panicked(String),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
            BatchError::Path(err) => write!(f, "Invalid destination path: {}", err),
            BatchError::Processing(err) => write!(f, "Enhancement failed: {}", err),
            BatchError::Encode { path, message } => {
                write!(f, "Cannot encode {}: {}", path.display(), message)
            }
            BatchError::Panicked(msg) => write!(f, "File task failed: {}", msg),
        }
    }
}

impl std::error::Error for BatchError {}

impl From<PathValidationError> for BatchError {
    fn from(err: PathValidationError) -> Self {
        BatchError::Path(err)
    }
}

impl From<PreprocessingError> for BatchError {
    fn from(err: PreprocessingError) -> Self {
        BatchError::Processing(err)
    }
}

impl BatchError {
    fn io(path: &Path, err: io::Error) -> Self {
        BatchError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::Io { .. } => "io",
            BatchError::Path(_) => "path",
            BatchError::Processing(_) => "processing",
            BatchError::Encode { .. } => "encode",
            BatchError::Panicked(_) => "panic",
        }
    }
}

/// A source file and its precomputed destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Result of walking the source tree.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub files: Vec<PlannedFile>,
    /// Number of directories mirrored (or that would be, in a dry run)
    pub directories: usize,
    /// Entries that could not be planned, already recorded as failures
    pub failures: Vec<FileRecord>,
}

/// Walk `source_root` and derive the destination of every file.
///
/// Directories are created under `dest_root` as they are found unless
/// `dry_run` is set. When `dest_root` lies inside `source_root` its subtree is
/// not walked.
pub fn plan(source_root: &Path, dest_root: &Path, dry_run: bool) -> BatchPlan {
    let mut batch_plan = BatchPlan::default();

    let walker = WalkDir::new(source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_within(dest_root, entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                warn!(path = %path.display(), error = %err, "Cannot read source entry");
                let error = BatchError::Io {
                    path: path.clone(),
                    message: err.to_string(),
                };
                batch_plan
                    .failures
                    .push(FileRecord::failed(path, PathBuf::new(), &error));
                continue;
            }
        };

        let destination = match mirror_path(source_root, dest_root, entry.path()) {
            Ok(destination) => destination,
            Err(err) => {
                error_logging::log_validation_error(
                    &err,
                    "mirror_path",
                    "path",
                    entry.path().to_str(),
                );
                batch_plan.failures.push(FileRecord::failed(
                    entry.path().to_path_buf(),
                    PathBuf::new(),
                    &BatchError::from(err),
                ));
                continue;
            }
        };

        if entry.file_type().is_dir() {
            batch_plan.directories += 1;
            if dry_run {
                debug!(path = %destination.display(), "Would create directory");
            } else if let Err(err) = fs::create_dir_all(&destination) {
                // Files below this directory fail individually on write.
                error_logging::log_filesystem_error(
                    &err,
                    "create_dir_all",
                    destination.to_str(),
                    None,
                );
            }
            continue;
        }

        batch_plan.files.push(PlannedFile {
            source: entry.into_path(),
            destination,
        });
    }

    batch_plan
}

/// Move `source` to `destination`, copying across filesystems when a rename
/// is not possible.
pub fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                error = %rename_err,
                "Rename failed, falling back to copy and remove"
            );
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
    }
}

/// What a dry run would do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Enhance,
    Relocate,
}

/// Outcome of one file task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Enhanced {
        fallback_pixels: u64,
        processing_time_ms: u32,
    },
    Relocated {
        reason: String,
    },
    Failed {
        error: String,
    },
    /// Not started because the batch was cancelled
    Skipped,
    /// Dry run only
    Planned {
        action: PlannedAction,
    },
}

impl FileOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            FileOutcome::Enhanced { .. } => "enhanced",
            FileOutcome::Relocated { .. } => "relocated",
            FileOutcome::Failed { .. } => "failed",
            FileOutcome::Skipped => "skipped",
            FileOutcome::Planned { .. } => "planned",
        }
    }
}

/// One line of the batch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileRecord {
    fn new(file: &PlannedFile, outcome: FileOutcome) -> Self {
        Self {
            source: file.source.clone(),
            destination: file.destination.clone(),
            outcome,
        }
    }

    fn failed(source: PathBuf, destination: PathBuf, error: &BatchError) -> Self {
        Self {
            source,
            destination,
            outcome: FileOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    fn skipped(file: &PlannedFile) -> Self {
        Self::new(file, FileOutcome::Skipped)
    }
}

/// Summary of a batch run, serializable to JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub directories: usize,
    pub enhanced: usize,
    pub relocated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub planned: usize,
    pub fallback_pixels: u64,
    pub files: Vec<FileRecord>,
}

impl BatchReport {
    fn from_records(
        source_root: &Path,
        dest_root: &Path,
        dry_run: bool,
        started_at: DateTime<Utc>,
        directories: usize,
        mut files: Vec<FileRecord>,
    ) -> Self {
        files.sort_by(|a, b| a.source.cmp(&b.source));

        let mut report = Self {
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            dry_run,
            started_at,
            finished_at: Utc::now(),
            directories,
            enhanced: 0,
            relocated: 0,
            failed: 0,
            skipped: 0,
            planned: 0,
            fallback_pixels: 0,
            files: Vec::new(),
        };

        for record in &files {
            match &record.outcome {
                FileOutcome::Enhanced {
                    fallback_pixels, ..
                } => {
                    report.enhanced += 1;
                    report.fallback_pixels += fallback_pixels;
                }
                FileOutcome::Relocated { .. } => report.relocated += 1,
                FileOutcome::Failed { .. } => report.failed += 1,
                FileOutcome::Skipped => report.skipped += 1,
                FileOutcome::Planned { .. } => report.planned += 1,
            }
        }
        report.files = files;
        report
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Records of the files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileRecord> {
        self.files
            .iter()
            .filter(|record| matches!(record.outcome, FileOutcome::Failed { .. }))
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Cannot serialize batch report: {}", e)))
    }

    pub fn write_json(&self, path: &Path) -> AppResult<()> {
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "Batch report written");
        Ok(())
    }
}

/// Per-file work, cloned into every blocking task.
#[derive(Clone)]
struct FileWorker {
    engine: Arc<FuzzyEngine>,
    config: Arc<EnhancementConfig>,
    dry_run: bool,
}

impl FileWorker {
    fn process(&self, file: &PlannedFile) -> FileRecord {
        let _span = observability::file_span(&file.source.to_string_lossy()).entered();
        let start_time = Instant::now();

        let outcome = if self.dry_run {
            self.plan_action(file)
        } else {
            match try_decode(&file.source) {
                Ok(decoded) => match self.enhance_file(&decoded, file) {
                    Ok(outcome) => outcome,
                    Err(err) => self.failure(file, err),
                },
                Err(decode_err) => {
                    debug!(reason = %decode_err, "Not an image, relocating");
                    match relocate(&file.source, &file.destination) {
                        Ok(()) => FileOutcome::Relocated {
                            reason: decode_err.to_string(),
                        },
                        Err(err) => self.failure(file, BatchError::io(&file.source, err)),
                    }
                }
            }
        };

        observability::record_batch_file_metrics(outcome.name(), start_time.elapsed());
        FileRecord::new(file, outcome)
    }

    fn plan_action(&self, file: &PlannedFile) -> FileOutcome {
        let action = match probe_format(&file.source) {
            Ok(_) => PlannedAction::Enhance,
            Err(_) => PlannedAction::Relocate,
        };
        info!(
            destination = %file.destination.display(),
            action = ?action,
            "Planned action"
        );
        FileOutcome::Planned { action }
    }

    fn enhance_file(
        &self,
        decoded: &DecodedImage,
        file: &PlannedFile,
    ) -> Result<FileOutcome, BatchError> {
        let result = pipeline::enhance(&decoded.image, &self.config, &self.engine)?;

        let format = ImageFormat::from_path(&file.destination).unwrap_or(decoded.format);
        result
            .image
            .save_with_format(&file.destination, format)
            .map_err(|e| BatchError::Encode {
                path: file.destination.clone(),
                message: e.to_string(),
            })?;

        debug!(
            destination = %file.destination.display(),
            format = ?format,
            fallback_pixels = result.fallback_pixels,
            "Enhanced image written"
        );
        Ok(FileOutcome::Enhanced {
            fallback_pixels: result.fallback_pixels,
            processing_time_ms: result.processing_time_ms,
        })
    }

    fn failure(&self, file: &PlannedFile, err: BatchError) -> FileOutcome {
        match &err {
            BatchError::Processing(_) => error_logging::log_processing_error(
                &err,
                "enhance",
                file.source.to_str(),
                None,
            ),
            _ => error_logging::log_filesystem_error(
                &err,
                "process_file",
                file.source.to_str(),
                fs::metadata(&file.source).ok().map(|m| m.len()),
            ),
        }
        observability::record_error_metrics(err.kind(), "batch");
        FileOutcome::Failed {
            error: err.to_string(),
        }
    }
}

/// Canonicalize an existing directory, or the nearest existing ancestor of a
/// path that does not exist yet with the missing tail appended.
async fn canonicalize_lenient(path: &Path) -> AppResult<PathBuf> {
    for ancestor in path.ancestors() {
        let existing = if ancestor.as_os_str().is_empty() {
            Path::new(".")
        } else {
            ancestor
        };
        let Ok(canonical) = tokio::fs::canonicalize(existing).await else {
            continue;
        };

        let tail = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
        validate_relative_path(tail).map_err(|e| {
            AppError::Validation(format!("Cannot resolve {}: {}", path.display(), e))
        })?;
        return Ok(canonical.join(tail));
    }

    Err(AppError::FileSystem(format!(
        "Cannot resolve {}",
        path.display()
    )))
}

/// Resolve both roots to canonical absolute paths and reject overlapping
/// ones that would overwrite the source tree.
///
/// The destination is created here unless `dry_run` is set.
async fn resolve_roots(
    source_root: &Path,
    dest_root: &Path,
    dry_run: bool,
) -> AppResult<(PathBuf, PathBuf)> {
    let source = tokio::fs::canonicalize(source_root).await.map_err(|e| {
        AppError::FileSystem(format!("Cannot read {}: {}", source_root.display(), e))
    })?;
    if !tokio::fs::metadata(&source).await?.is_dir() {
        return Err(AppError::Validation(format!(
            "Source {} is not a directory",
            source_root.display()
        )));
    }

    let dest = if dry_run {
        canonicalize_lenient(dest_root).await?
    } else {
        tokio::fs::create_dir_all(dest_root).await.map_err(|e| {
            AppError::FileSystem(format!("Cannot create {}: {}", dest_root.display(), e))
        })?;
        tokio::fs::canonicalize(dest_root).await?
    };

    if source == dest {
        return Err(AppError::Validation(format!(
            "Source and destination must differ: both resolve to {}",
            source.display()
        )));
    }

    debug!(source = %source.display(), dest = %dest.display(), "Batch roots resolved");
    Ok((source, dest))
}

/// Runs a batch over a source tree with a bounded pool of blocking tasks.
pub struct BatchDriver {
    worker: FileWorker,
    workers: usize,
    cancel: CancellationToken,
}

impl BatchDriver {
    /// Build the driver and its fuzzy engine from the application configuration.
    pub fn new(config: &AppConfig) -> Self {
        let engine = config.enhancement.build_engine();
        Self {
            worker: FileWorker {
                engine: Arc::new(engine),
                config: Arc::new(config.enhancement.clone()),
                dry_run: config.batch.dry_run,
            },
            workers: config.batch.effective_workers(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the batch at file granularity when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &FuzzyEngine {
        &self.worker.engine
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Enhance or relocate every file under `source_root` into `dest_root`.
    ///
    /// Fails only when the roots themselves are unusable; every per-file
    /// problem ends up in the returned report.
    pub async fn run(&self, source_root: &Path, dest_root: &Path) -> AppResult<BatchReport> {
        let span = observability::batch_span(
            &source_root.to_string_lossy(),
            &dest_root.to_string_lossy(),
        );
        self.run_batch(source_root, dest_root).instrument(span).await
    }

    async fn run_batch(&self, source_root: &Path, dest_root: &Path) -> AppResult<BatchReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let dry_run = self.worker.dry_run;

        let (source_root, dest_root) = resolve_roots(source_root, dest_root, dry_run).await?;

        let (source, dest) = (source_root.clone(), dest_root.clone());
        let batch_plan = tokio::task::spawn_blocking(move || plan(&source, &dest, dry_run))
            .await
            .map_err(|e| AppError::Internal(format!("Planning task failed: {}", e)))?;

        info!(
            files = batch_plan.files.len(),
            directories = batch_plan.directories,
            workers = self.workers,
            dry_run,
            "Batch planned"
        );

        let mut records = batch_plan.failures;
        let worker = self.worker.clone();
        records.extend(
            self.execute(batch_plan.files, move |file| worker.process(file))
                .await,
        );

        let report = BatchReport::from_records(
            &source_root,
            &dest_root,
            dry_run,
            started_at,
            batch_plan.directories,
            records,
        );

        observability::record_batch_metrics(report.total_files(), report.failed, start_time.elapsed());
        info!(
            enhanced = report.enhanced,
            relocated = report.relocated,
            failed = report.failed,
            skipped = report.skipped,
            planned = report.planned,
            fallback_pixels = report.fallback_pixels,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Batch finished"
        );
        if self.cancel.is_cancelled() {
            warn!(skipped = report.skipped, "Batch cancelled before completion");
        }

        Ok(report)
    }

    /// Runs `process` on every file in blocking tasks, at most `workers` at a
    /// time. Every file yields exactly one record, including files whose task
    /// panicked.
    async fn execute<F>(&self, files: Vec<PlannedFile>, process: F) -> Vec<FileRecord>
    where
        F: Fn(&PlannedFile) -> FileRecord + Clone + Send + 'static,
    {
        let mut records = Vec::with_capacity(files.len());
        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, PlannedFile> = HashMap::new();

        for file in files {
            if self.cancel.is_cancelled() {
                records.push(self.skip(&file));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                records.push(self.skip(&file));
                continue;
            };

            let process = process.clone();
            let task_file = file.clone();
            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                process(&task_file)
            });
            in_flight.insert(handle.id(), file);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, record)) => {
                    in_flight.remove(&id);
                    records.push(record);
                }
                Err(err) => {
                    let error = BatchError::Panicked(err.to_string());
                    error_logging::log_internal_error(&error, "batch", "join_file_task");
                    observability::record_error_metrics(error.kind(), "batch");
                    observability::record_batch_file_metrics("failed", Duration::ZERO);
                    match in_flight.remove(&err.id()) {
                        Some(file) => records.push(FileRecord::failed(
                            file.source,
                            file.destination,
                            &error,
                        )),
                        None => records.push(FileRecord::failed(
                            PathBuf::new(),
                            PathBuf::new(),
                            &error,
                        )),
                    }
                }
            }
        }

        records
    }

    fn skip(&self, file: &PlannedFile) -> FileRecord {
        observability::record_batch_file_metrics("skipped", Duration::ZERO);
        FileRecord::skipped(file)
    }
}
