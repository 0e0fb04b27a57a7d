//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use crate::errors::{AppError, AppResult};
use crate::fuzzy::{DefuzzMethod, FuzzyEngine};
use crate::observability_config::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub use crate::preprocessing::MAX_IMAGE_SIZE;

/// Largest accepted worker count.
pub const MAX_WORKERS: usize = 1024;

/// Parameters of the per-image enhancement pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// Side of the square working image in pixels
    pub size: u32,
    /// CLAHE clip limit
    pub clip_limit: f32,
    /// CLAHE tile grid (columns, rows)
    pub tile_grid: (u32, u32),
    /// Global contrast constant of the contrast-control law
    pub contrast_constant: f64,
    /// Defuzzification method of the fuzzy engine
    pub defuzz_method: DefuzzMethod,
    /// Output used when no fuzzy rule fires
    pub fallback_value: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            size: 224,
            clip_limit: 2.0,
            tile_grid: (8, 8),
            contrast_constant: crate::preprocessing::DEFAULT_CONTRAST_CONSTANT,
            defuzz_method: DefuzzMethod::Centroid,
            fallback_value: FuzzyEngine::DEFAULT_FALLBACK,
        }
    }
}

impl EnhancementConfig {
    /// Validate enhancement configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.size == 0 {
            return Err(AppError::Config("Image size cannot be 0".to_string()));
        }

        if self.size > MAX_IMAGE_SIZE {
            return Err(AppError::Config(format!(
                "Image size cannot be greater than {}",
                MAX_IMAGE_SIZE
            )));
        }

        if !self.clip_limit.is_finite() || self.clip_limit <= 0.0 {
            return Err(AppError::Config(format!(
                "Clip limit must be a positive number, got {}",
                self.clip_limit
            )));
        }

        if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
            return Err(AppError::Config(
                "Tile grid dimensions cannot be 0".to_string(),
            ));
        }

        if !self.contrast_constant.is_finite() || self.contrast_constant < 0.0 {
            return Err(AppError::Config(format!(
                "Contrast constant must be a non-negative number, got {}",
                self.contrast_constant
            )));
        }

        if !(0.0..=255.0).contains(&self.fallback_value) {
            return Err(AppError::Config(format!(
                "Fallback value must be within [0, 255], got {}",
                self.fallback_value
            )));
        }

        Ok(())
    }

    /// Build the fuzzy engine described by this configuration.
    pub fn build_engine(&self) -> FuzzyEngine {
        FuzzyEngine::builder()
            .defuzz_method(self.defuzz_method)
            .fallback_value(self.fallback_value)
            .build()
    }
}

/// Batch driver configuration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrent file workers; 0 means one per available CPU
    pub workers: usize,
    /// Plan and log actions without touching the filesystem
    pub dry_run: bool,
    /// Where to write the JSON batch report
    pub report_path: Option<PathBuf>,
}

impl BatchConfig {
    /// Validate batch configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.workers > MAX_WORKERS {
            return Err(AppError::Config(format!(
                "Worker count cannot be greater than {}",
                MAX_WORKERS
            )));
        }

        if let Some(path) = &self.report_path {
            if path.as_os_str().is_empty() {
                return Err(AppError::Config("Report path cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Worker count with `0` resolved to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Enhancement pipeline configuration
    pub enhancement: EnhancementConfig,
    /// Batch driver configuration
    pub batch: BatchConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();
        let defaults = EnhancementConfig::default();

        // Load enhancement configuration
        config.enhancement.size = env_or("FCE_SIZE", defaults.size)?;
        config.enhancement.clip_limit = env_or("FCE_CLIP_LIMIT", defaults.clip_limit)?;
        config.enhancement.tile_grid = (
            env_or("FCE_TILE_COLS", defaults.tile_grid.0)?,
            env_or("FCE_TILE_ROWS", defaults.tile_grid.1)?,
        );
        config.enhancement.contrast_constant =
            env_or("FCE_CONTRAST", defaults.contrast_constant)?;
        config.enhancement.defuzz_method = env_or("FCE_DEFUZZ", defaults.defuzz_method)?;
        config.enhancement.fallback_value = env_or("FCE_FALLBACK", defaults.fallback_value)?;

        // Load batch configuration
        config.batch.workers = env_or("FCE_WORKERS", 0usize)?;
        config.batch.dry_run = env::var("FCE_DRY_RUN")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";
        config.batch.report_path = env::var("FCE_REPORT_PATH").ok().map(PathBuf::from);

        // Load observability configuration (uses existing defaults and validation)
        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.enhancement.validate()?;
        self.batch.validate()?;
        self.observability
            .validate()
            .map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: size={}, clip_limit={}, tile_grid={}x{}, contrast={}, defuzz={}, workers={}, dry_run={}",
            self.enhancement.size,
            self.enhancement.clip_limit,
            self.enhancement.tile_grid.0,
            self.enhancement.tile_grid.1,
            self.enhancement.contrast_constant,
            self.enhancement.defuzz_method,
            self.batch.effective_workers(),
            self.batch.dry_run
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enhancement.size, 224);
        assert_eq!(config.enhancement.clip_limit, 2.0);
        assert_eq!(config.enhancement.tile_grid, (8, 8));
        assert_eq!(config.enhancement.contrast_constant, 100.0);
    }

    #[test]
    fn test_enhancement_config_validation() {
        let mut config = EnhancementConfig::default();

        // Invalid: zero size
        config.size = 0;
        assert!(config.validate().is_err());
        config.size = MAX_IMAGE_SIZE + 1;
        assert!(config.validate().is_err());
        config.size = 224;

        // Invalid: non-positive clip limit
        config.clip_limit = 0.0;
        assert!(config.validate().is_err());
        config.clip_limit = f32::NAN;
        assert!(config.validate().is_err());
        config.clip_limit = 2.0;

        // Invalid: zero tile grid
        config.tile_grid = (0, 8);
        assert!(config.validate().is_err());
        config.tile_grid = (8, 8);

        // Invalid: negative contrast constant
        config.contrast_constant = -1.0;
        assert!(config.validate().is_err());
        config.contrast_constant = 300.0;
        assert!(config.validate().is_ok());

        // Invalid: fallback outside the universe
        config.fallback_value = 256.0;
        assert!(config.validate().is_err());
        config.fallback_value = 0.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_config_validation() {
        let mut config = BatchConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.effective_workers() >= 1);

        config.workers = 3;
        assert_eq!(config.effective_workers(), 3);

        config.workers = MAX_WORKERS + 1;
        assert!(config.validate().is_err());
        config.workers = 3;

        config.report_path = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_engine_uses_config() {
        let config = EnhancementConfig {
            defuzz_method: DefuzzMethod::Bisector,
            fallback_value: 12.0,
            ..EnhancementConfig::default()
        };
        let engine = config.build_engine();

        assert_eq!(engine.defuzz_method(), DefuzzMethod::Bisector);
        assert_eq!(engine.fallback_value(), 12.0);
    }

    #[test]
    fn test_summary_mentions_parameters() {
        let summary = AppConfig::default().summary();
        assert!(summary.contains("size=224"));
        assert!(summary.contains("defuzz=centroid"));
    }
}
