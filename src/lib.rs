//! # Fuzzy CLAHE Radiograph Enhancer
//!
//! Contrast enhancement for grayscale radiographs: CLAHE histogram
//! equalization followed by a per-pixel Mamdani fuzzy inference step driven
//! by a contrast-control signal, plus a batch driver that mirrors a source
//! tree into a destination tree.

pub mod batch;
pub mod config;
pub mod errors;
pub mod fuzzy;
pub mod observability;
pub mod observability_config;
pub mod path_validation;
pub mod pipeline;
pub mod preprocessing;

// Re-export types for easier access
pub use batch::{BatchDriver, BatchReport, FileOutcome};
pub use config::{AppConfig, EnhancementConfig};
pub use fuzzy::{DefuzzMethod, FuzzyEngine, Inference};
pub use pipeline::{enhance, enhance_with_defaults};
pub use preprocessing::{contrast_control, equalize, PreprocessingError};
