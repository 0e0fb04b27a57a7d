//! # Application Error Types
//!
//! This module defines common error types used throughout the enhancer.
//! It provides structured error handling for the pipeline and the batch driver.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (paths, inputs, etc.)
    Validation(String),
    /// Image enhancement errors
    Processing(String),
    /// File system errors
    FileSystem(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Processing(msg) => write!(f, "[PROCESSING] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<crate::preprocessing::PreprocessingError> for AppError {
    fn from(err: crate::preprocessing::PreprocessingError) -> Self {
        AppError::Processing(err.to_string())
    }
}

impl From<crate::path_validation::PathValidationError> for AppError {
    fn from(err: crate::path_validation::PathValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Longest input value echoed into a log record, in characters.
    const MAX_LOGGED_INPUT_CHARS: usize = 100;

    /// Shorten `value` to at most `max_chars` characters, cutting on a char boundary.
    pub fn truncate_for_log(value: &str, max_chars: usize) -> String {
        match value.char_indices().nth(max_chars) {
            Some((index, _)) => format!("{}...", &value[..index]),
            None => value.to_string(),
        }
    }

    /// Log image processing errors with image context
    pub fn log_processing_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        dimensions: Option<(u32, u32)>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            dimensions = ?dimensions,
            "Image processing failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| truncate_for_log(v, MAX_LOGGED_INPUT_CHARS)),
            "Validation failed"
        );
    }

    /// Log internal application errors with component context
    pub fn log_internal_error(error: &impl std::fmt::Display, component: &str, operation: &str) {
        error!(
            error = %error,
            component = %component,
            operation = %operation,
            "Internal application error"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
