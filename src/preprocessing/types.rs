//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared result and error types used across
//! the preprocessing sub-modules.

use image::GrayImage;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// The input image has no pixels
    EmptyImage,
    /// A size, clip limit or tile grid parameter is out of range
    InvalidParameters { message: String },
    /// The image could not be resized or equalized to the requested dimensions
    Dimension { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::EmptyImage => write!(f, "Image has no pixels"),
            PreprocessingError::InvalidParameters { message } => {
                write!(f, "Invalid preprocessing parameters: {}", message)
            }
            PreprocessingError::Dimension { message } => {
                write!(f, "Image dimension error: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Result of CLAHE contrast equalization.
#[derive(Debug, Clone)]
pub struct ClaheImageResult {
    /// The equalized single-channel image
    pub image: GrayImage,
    /// Clip limit used for histogram clipping
    pub clip_limit: f32,
    /// Requested tile grid (columns, rows)
    pub tile_grid: (u32, u32),
    /// Tile dimensions in pixels actually used (width, height)
    pub tile_size: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of the full enhancement pipeline for one image.
#[derive(Debug, Clone)]
pub struct EnhancementResult {
    /// The fuzzy-enhanced image
    pub image: GrayImage,
    /// The CLAHE-equalized intermediate
    pub equalized: GrayImage,
    /// Pixels whose inference hit the defuzzification fallback
    pub fallback_pixels: u64,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
