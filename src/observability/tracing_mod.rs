//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - Tracing span creation utilities

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    // Create the filter based on configuration
    let level = config.log_level.to_lowercase();
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fuzzy_clahe={}", level).parse()?)
        .add_directive(format!("fce_preprocessing={}", level).parse()?)
        .add_directive(format!("fce_pipeline={}", level).parse()?);

    // Initialize based on environment (pretty for development, JSON for others)
    if config.use_pretty_logs() {
        // Pretty formatting for development
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    } else {
        // JSON formatting for production (default)
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for a whole batch run
pub fn batch_span(source_root: &str, dest_root: &str) -> tracing::Span {
    tracing::info_span!(
        "batch_run",
        source_root = source_root,
        dest_root = dest_root,
        component = "batch"
    )
}

/// Create a span for the processing of one file
pub fn file_span(path: &str) -> tracing::Span {
    tracing::info_span!("file_operation", path = path, component = "batch")
}

/// Create a span for the enhancement of one decoded image
pub fn enhance_span(width: u32, height: u32) -> tracing::Span {
    tracing::debug_span!(
        "enhance_image",
        width = width,
        height = height,
        component = "pipeline"
    )
}
