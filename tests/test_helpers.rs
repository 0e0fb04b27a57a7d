//! # Test Helper Library
//!
//! Common setup for integration tests: synthetic radiograph-like images and
//! small source trees in temporary directories.

#![allow(dead_code)]

use fuzzy_clahe::config::AppConfig;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A horizontal-plus-vertical gradient, roughly the shape of a bone shadow.
pub fn gradient_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let value = (x * 255 / width.max(1) + y * 64 / height.max(1)) % 256;
        Luma([value as u8])
    })
}

pub fn uniform_image(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
}

/// Write a gradient PNG at `path`, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    gradient_image(width, height)
        .save_with_format(path, ImageFormat::Png)
        .expect("Failed to write test PNG");
}

/// Write a text file at `path`, creating parent directories.
pub fn write_text(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, contents).expect("Failed to write test file");
}

/// Source and destination roots living in separate temporary directories.
pub struct TestTree {
    pub source_dir: TempDir,
    pub dest_dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            source_dir: TempDir::new().expect("Failed to create source dir"),
            dest_dir: TempDir::new().expect("Failed to create dest dir"),
        }
    }

    pub fn source(&self) -> &Path {
        self.source_dir.path()
    }

    /// Destination root; not created until a batch runs.
    pub fn dest(&self) -> PathBuf {
        self.dest_dir.path().join("enhanced")
    }
}

/// Default configuration with a small working size for fast tests.
pub fn small_config(size: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.enhancement.size = size;
    config.batch.workers = 2;
    config
}
