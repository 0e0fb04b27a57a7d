//! # Image Enhancement Pipeline
//!
//! Equalizes an image, then maps every pixel through the contrast-control law
//! and the fuzzy engine. Rows are evaluated in parallel; each worker owns the
//! output rows it writes, and the engine is only read.

use image::{DynamicImage, GrayImage};
use rayon::prelude::*;

use crate::config::EnhancementConfig;
use crate::fuzzy::{FuzzyEngine, Inference};
use crate::observability;
use crate::preprocessing::{contrast_control, equalize, EnhancementResult, PreprocessingError};

/// Enhances one pixel: contrast control, then fuzzy inference.
pub fn enhance_pixel(intensity: u8, contrast_constant: f64, engine: &FuzzyEngine) -> Inference {
    engine.evaluate(intensity as f64, contrast_control(intensity, contrast_constant))
}

/// Rounds and clamps a crisp intensity into the 8-bit range.
pub fn to_pixel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Maps every pixel of an already-equalized image through the fuzzy engine.
///
/// Returns the enhanced image and the number of pixels that used the
/// engine's fallback value.
pub fn enhance_equalized(
    equalized: &GrayImage,
    contrast_constant: f64,
    engine: &FuzzyEngine,
) -> Result<(GrayImage, u64), PreprocessingError> {
    let (width, height) = equalized.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let row_len = width as usize;
    let mut buffer = vec![0u8; equalized.as_raw().len()];

    let fallback_pixels: u64 = buffer
        .par_chunks_mut(row_len)
        .zip(equalized.as_raw().par_chunks(row_len))
        .map(|(out_row, in_row)| {
            let mut fallbacks = 0u64;
            for (out, &intensity) in out_row.iter_mut().zip(in_row) {
                let inference = enhance_pixel(intensity, contrast_constant, engine);
                if inference.is_fallback() {
                    fallbacks += 1;
                }
                *out = to_pixel(inference.value());
            }
            fallbacks
        })
        .sum();

    let image = GrayImage::from_raw(width, height, buffer).ok_or_else(|| {
        PreprocessingError::Dimension {
            message: format!("Output buffer does not match {}x{}", width, height),
        }
    })?;

    Ok((image, fallback_pixels))
}

/// Runs the full pipeline: resize, CLAHE, per-pixel fuzzy enhancement.
///
/// # Arguments
///
/// * `image` - The decoded input image (converted to single-channel)
/// * `config` - Size, CLAHE and contrast parameters
/// * `engine` - The shared fuzzy engine, built once per run
///
/// # Examples
///
/// ```
/// use fuzzy_clahe::config::EnhancementConfig;
/// use fuzzy_clahe::pipeline::enhance;
/// use image::{DynamicImage, GrayImage, Luma};
///
/// let config = EnhancementConfig { size: 16, ..EnhancementConfig::default() };
/// let engine = config.build_engine();
/// let img = DynamicImage::ImageLuma8(GrayImage::from_fn(40, 30, |x, y| Luma([(x * 3 + y) as u8])));
///
/// let result = enhance(&img, &config, &engine).unwrap();
/// assert_eq!(result.image.dimensions(), (16, 16));
/// ```
pub fn enhance(
    image: &DynamicImage,
    config: &EnhancementConfig,
    engine: &FuzzyEngine,
) -> Result<EnhancementResult, PreprocessingError> {
    let start_time = std::time::Instant::now();
    let _span = observability::enhance_span(image.width(), image.height()).entered();

    if !config.contrast_constant.is_finite() {
        return Err(PreprocessingError::InvalidParameters {
            message: format!("Invalid contrast constant: {}", config.contrast_constant),
        });
    }

    let equalized = equalize(image, config.size, config.clip_limit, config.tile_grid)?;
    let (enhanced, fallback_pixels) =
        enhance_equalized(&equalized.image, config.contrast_constant, engine)?;

    let processing_time = start_time.elapsed();

    if fallback_pixels > 0 {
        tracing::warn!(
            fallback_pixels,
            fallback_value = engine.fallback_value(),
            contrast_constant = config.contrast_constant,
            "No fuzzy rule fired for some pixels; fallback value used"
        );
    }
    observability::record_enhancement_metrics(processing_time, fallback_pixels);

    tracing::debug!(
        target: "fce_pipeline",
        "Image enhanced in {:.2}ms: size={}, fallback_pixels={}",
        processing_time.as_millis(),
        config.size,
        fallback_pixels
    );

    Ok(EnhancementResult {
        image: enhanced,
        equalized: equalized.image,
        fallback_pixels,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// [`enhance`] with the default configuration and a freshly built engine.
///
/// Convenient for single images; batches should build the engine once and
/// call [`enhance`].
pub fn enhance_with_defaults(image: &DynamicImage) -> Result<EnhancementResult, PreprocessingError> {
    let config = EnhancementConfig::default();
    let engine = config.build_engine();
    enhance(image, &config, &engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_to_pixel_rounds_and_clamps() {
        assert_eq!(to_pixel(12.4), 12);
        assert_eq!(to_pixel(12.5), 13);
        assert_eq!(to_pixel(-3.0), 0);
        assert_eq!(to_pixel(300.0), 255);
        assert_eq!(to_pixel(f64::NAN), 0);
    }

    #[test]
    fn test_enhance_pixel_matches_engine() {
        let engine = FuzzyEngine::new();
        let direct = engine.compute(180.0, 180.0 * 100.0 / 255.0);
        assert_eq!(enhance_pixel(180, 100.0, &engine).value(), direct);
    }

    #[test]
    fn test_enhance_equalized_is_position_independent() {
        let engine = FuzzyEngine::new();
        let img = GrayImage::from_fn(9, 7, |x, y| Luma([((x * 29 + y * 13) % 256) as u8]));
        let (out, fallbacks) = enhance_equalized(&img, 100.0, &engine).unwrap();

        assert_eq!(fallbacks, 0);
        for (x, y, pixel) in img.enumerate_pixels() {
            let expected = to_pixel(enhance_pixel(pixel[0], 100.0, &engine).value());
            assert_eq!(out.get_pixel(x, y)[0], expected);
        }
    }

    #[test]
    fn test_enhance_equalized_counts_fallbacks() {
        // A negative contrast constant puts every non-black pixel outside the
        // contrast-control sets.
        let engine = FuzzyEngine::builder().fallback_value(5.0).build();
        let img = GrayImage::from_pixel(3, 3, Luma([100]));
        let (out, fallbacks) = enhance_equalized(&img, -100.0, &engine).unwrap();

        assert_eq!(fallbacks, 9);
        assert!(out.pixels().all(|p| p[0] == 5));
    }

    #[test]
    fn test_enhance_equalized_rejects_empty() {
        let engine = FuzzyEngine::new();
        let img = GrayImage::new(0, 0);
        assert_eq!(
            enhance_equalized(&img, 100.0, &engine).unwrap_err(),
            PreprocessingError::EmptyImage
        );
    }

    #[test]
    fn test_enhance_rejects_invalid_config() {
        let engine = FuzzyEngine::new();
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([10])));

        let config = EnhancementConfig {
            clip_limit: 0.0,
            ..EnhancementConfig::default()
        };
        assert!(enhance(&img, &config, &engine).is_err());

        let config = EnhancementConfig {
            size: 0,
            ..EnhancementConfig::default()
        };
        assert!(enhance(&img, &config, &engine).is_err());
    }
}
