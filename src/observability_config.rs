//! # Observability Configuration
//!
//! Environment-specific configuration for logging and metrics.

use std::env;
use std::path::PathBuf;

/// Accepted log levels.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for the crate's own targets
    pub log_level: String,
    /// Log format override ("pretty" or "json"); None follows the environment
    pub log_format: Option<String>,
    /// Whether to install the Prometheus metrics recorder
    pub enable_metrics: bool,
    /// File that receives the rendered metrics snapshot at the end of a run
    pub metrics_output_path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
            enable_metrics: true,
            metrics_output_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").ok(),
            enable_metrics: env::var("ENABLE_METRICS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            metrics_output_path: env::var("METRICS_OUTPUT_PATH").ok().map(PathBuf::from),
        }
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether logs should be human readable rather than JSON
    pub fn use_pretty_logs(&self) -> bool {
        match self.log_format.as_deref() {
            Some(format) => format.eq_ignore_ascii_case("pretty"),
            None => self.is_development(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }

        if let Some(format) = &self.log_format {
            let format = format.to_lowercase();
            if format != "pretty" && format != "json" {
                return Err(format!("Invalid log format: {}", format));
            }
        }

        if self.metrics_output_path.is_some() && !self.enable_metrics {
            return Err("Metrics output path is set but metrics are disabled".to_string());
        }

        Ok(())
    }
}
