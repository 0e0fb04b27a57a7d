//! # Image Preprocessing Module
//!
//! This module provides the equalization stage of the enhancement pipeline and
//! the contrast-control signal that drives fuzzy inference.
//!
//! The module is organized into focused sub-modules:
//! - `equalization`: resizing and CLAHE with tile interpolation
//! - `contrast`: the linear contrast-control law
//! - `types`: Shared types and error definitions

pub mod contrast;
pub mod equalization;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{ClaheImageResult, EnhancementResult, PreprocessingError};

pub use contrast::{contrast_control, DEFAULT_CONTRAST_CONSTANT};
pub use equalization::{apply_clahe, equalize, resize_to_square, MAX_IMAGE_SIZE};
