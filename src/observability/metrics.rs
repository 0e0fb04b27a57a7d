//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Prometheus recorder setup
//! - Snapshot export to a file at the end of a batch
//! - Metrics recording functions for the pipeline and the batch driver

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;

use crate::observability_config::ObservabilityConfig;

/// Initialize metrics collection with Prometheus exporter and configuration
///
/// Returns `None` when metrics are disabled.
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enable_metrics {
        tracing::info!("Metrics collection disabled");
        return Ok(None);
    }

    // Create Prometheus recorder
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    tracing::info!(
        metrics_output_path = ?config.metrics_output_path,
        "Metrics collection initialized"
    );
    Ok(Some(handle))
}

/// Render the current metrics in Prometheus text format into `path`
pub fn write_metrics_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    let rendered = handle.render();
    std::fs::write(path, rendered)?;
    tracing::info!(path = %path.display(), "Metrics snapshot written");
    Ok(())
}

/// Record one image enhancement
pub fn record_enhancement_metrics(duration: std::time::Duration, fallback_pixels: u64) {
    metrics::counter!("fce_images_total").increment(1);
    metrics::histogram!("fce_enhance_duration_seconds").record(duration.as_secs_f64());
    if fallback_pixels > 0 {
        metrics::counter!("fce_defuzz_fallback_total").increment(fallback_pixels);
        metrics::counter!("fce_images_with_fallback_total").increment(1);
    }
}

/// Record the outcome of one batch file ("enhanced", "relocated", "failed", "skipped")
pub fn record_batch_file_metrics(outcome: &str, duration: std::time::Duration) {
    let outcome = outcome.to_string();
    metrics::counter!("fce_batch_files_total", "outcome" => outcome.clone()).increment(1);
    metrics::histogram!("fce_batch_file_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

/// Record a completed batch run
pub fn record_batch_metrics(files: usize, failed: usize, duration: std::time::Duration) {
    metrics::counter!("fce_batch_runs_total").increment(1);
    metrics::gauge!("fce_batch_last_files").set(files as f64);
    metrics::gauge!("fce_batch_last_failed").set(failed as f64);
    metrics::histogram!("fce_batch_duration_seconds").record(duration.as_secs_f64());
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}
