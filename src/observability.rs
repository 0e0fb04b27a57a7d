//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection with a Prometheus recorder
//! - Span helpers for batch runs, files and images

pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::observability_config::ObservabilityConfig;

pub use self::metrics::{
    init_metrics_with_config, record_batch_file_metrics, record_batch_metrics,
    record_enhancement_metrics, record_error_metrics, write_metrics_snapshot,
};
pub use self::tracing_mod::{batch_span, enhance_span, file_span, init_tracing_with_config};

/// Initialize the observability stack with custom configuration
///
/// Returns the metrics handle when metrics are enabled so the caller can
/// export a snapshot at the end of the run.
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    // Validate configuration
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    // Initialize tracing first
    init_tracing_with_config(config)?;

    // Initialize metrics
    let metrics_handle = init_metrics_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = %config.enable_metrics,
        "Observability stack initialized successfully"
    );
    Ok(metrics_handle)
}

/// Initialize the observability stack from environment variables
pub fn init_observability() -> Result<Option<PrometheusHandle>> {
    let config = ObservabilityConfig::from_env();
    init_observability_with_config(&config)
}

/// Export the metrics snapshot if both a handle and an output path exist
pub fn finish_observability(handle: Option<&PrometheusHandle>, config: &ObservabilityConfig) -> Result<()> {
    if let (Some(handle), Some(path)) = (handle, config.metrics_output_path.as_deref()) {
        write_metrics_snapshot(handle, path)?;
    }
    Ok(())
}
