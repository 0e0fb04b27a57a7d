//! # Histogram Equalization Module
//!
//! This module resizes radiographs to the square working size and applies
//! Contrast Limited Adaptive Histogram Equalization (CLAHE) with bilinear
//! interpolation between tile mappings to avoid block artifacts.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

use super::types::{ClaheImageResult, PreprocessingError};

/// Largest accepted working image side.
pub const MAX_IMAGE_SIZE: u32 = 8192;

/// Number of intensity levels of an 8-bit image.
const LEVELS: usize = 256;

/// Converts the image to luma and resizes it to `size × size`.
///
/// Uses bilinear (triangle) filtering, which is deterministic for a given
/// input. Images that are already `size × size` are only converted.
pub fn resize_to_square(image: &DynamicImage, size: u32) -> Result<GrayImage, PreprocessingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }
    if size == 0 || size > MAX_IMAGE_SIZE {
        return Err(PreprocessingError::InvalidParameters {
            message: format!("Invalid size {}: must be within 1..={}", size, MAX_IMAGE_SIZE),
        });
    }

    let gray = image.to_luma8();
    if gray.dimensions() == (size, size) {
        return Ok(gray);
    }

    let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);
    if resized.dimensions() != (size, size) {
        return Err(PreprocessingError::Dimension {
            message: format!(
                "Resize produced {}x{} instead of {}x{}",
                resized.width(),
                resized.height(),
                size,
                size
            ),
        });
    }
    Ok(resized)
}

/// Resizes the image to `size × size` and applies CLAHE.
///
/// # Arguments
///
/// * `image` - The decoded input image (any color type; converted to luma)
/// * `size` - Side of the square working image
/// * `clip_limit` - Histogram clip limit as a multiple of the uniform bin count
/// * `tile_grid` - Number of tiles as (columns, rows)
///
/// # Examples
///
/// ```
/// use fuzzy_clahe::preprocessing::equalize;
/// use image::{DynamicImage, GrayImage, Luma};
///
/// let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 48, Luma([90])));
/// let equalized = equalize(&img, 32, 2.0, (8, 8)).unwrap();
/// assert_eq!(equalized.image.dimensions(), (32, 32));
/// ```
pub fn equalize(
    image: &DynamicImage,
    size: u32,
    clip_limit: f32,
    tile_grid: (u32, u32),
) -> Result<ClaheImageResult, PreprocessingError> {
    validate_clahe_parameters(clip_limit, tile_grid)?;
    let gray = resize_to_square(image, size)?;
    apply_clahe(&gray, clip_limit, tile_grid)
}

/// Applies Contrast Limited Adaptive Histogram Equalization (CLAHE) to enhance local contrast.
///
/// The image is split into `tile_grid` tiles; each tile gets its own clipped
/// histogram mapping and every pixel blends the mappings of the four nearest
/// tile centres. A grid finer than the image degrades to one-pixel tiles.
///
/// # Arguments
///
/// * `image` - The grayscale image to equalize
/// * `clip_limit` - Maximum bin height as a multiple of the uniform bin count (recommended: 2.0-4.0)
/// * `tile_grid` - Number of tiles as (columns, rows) (recommended: (8, 8))
///
/// # Returns
///
/// Returns a `Result` containing the equalized image and metadata, or a `PreprocessingError`
pub fn apply_clahe(
    image: &GrayImage,
    clip_limit: f32,
    tile_grid: (u32, u32),
) -> Result<ClaheImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    validate_clahe_parameters(clip_limit, tile_grid)?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let (tile_width, tiles_x) = tile_layout(width, tile_grid.0);
    let (tile_height, tiles_y) = tile_layout(height, tile_grid.1);

    // Per-tile mappings, row-major
    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for tile_y in 0..tiles_y {
        for tile_x in 0..tiles_x {
            let x0 = tile_x * tile_width;
            let y0 = tile_y * tile_height;
            let x1 = (x0 + tile_width).min(width);
            let y1 = (y0 + tile_height).min(height);
            luts.push(compute_tile_lut(image, (x0, y0, x1, y1), clip_limit));
        }
    }

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let value = image.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, wx) = neighbours(x, tile_width, tiles_x);
        let (ty0, ty1, wy) = neighbours(y, tile_height, tiles_y);

        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;
        let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
        let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
        let blended = top * (1.0 - wy) + bottom * wy;

        pixel[0] = blended.round().clamp(0.0, 255.0) as u8;
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "fce_preprocessing",
        "CLAHE applied in {:.2}ms: clip_limit={}, tile_grid={:?}, tile_size={}x{}",
        processing_time.as_millis(),
        clip_limit,
        tile_grid,
        tile_width,
        tile_height
    );

    Ok(ClaheImageResult {
        image: output,
        clip_limit,
        tile_grid,
        tile_size: (tile_width, tile_height),
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

fn validate_clahe_parameters(clip_limit: f32, tile_grid: (u32, u32)) -> Result<(), PreprocessingError> {
    if !clip_limit.is_finite() || clip_limit <= 0.0 {
        return Err(PreprocessingError::InvalidParameters {
            message: format!("Invalid clip limit: {}. Must be > 0.0", clip_limit),
        });
    }

    if tile_grid.0 == 0 || tile_grid.1 == 0 {
        return Err(PreprocessingError::InvalidParameters {
            message: "Invalid tile grid: dimensions must be > 0".to_string(),
        });
    }

    Ok(())
}

/// Tile length in pixels and number of tiles needed to cover `len` pixels
/// split into `tiles` tiles.
fn tile_layout(len: u32, tiles: u32) -> (u32, u32) {
    let tile_len = len.div_ceil(tiles).max(1);
    (tile_len, len.div_ceil(tile_len))
}

/// The two tile indices around pixel `pos` and the weight of the second one.
fn neighbours(pos: u32, tile_len: u32, tiles: u32) -> (u32, u32, f32) {
    let f = pos as f32 / tile_len as f32 - 0.5;
    let lower = f.floor();
    let weight = f - lower;

    let last = tiles as i64 - 1;
    let i0 = (lower as i64).clamp(0, last) as u32;
    let i1 = (lower as i64 + 1).clamp(0, last) as u32;
    (i0, i1, weight)
}

/// Builds the clipped equalization mapping of one tile.
fn compute_tile_lut(image: &GrayImage, bounds: (u32, u32, u32, u32), clip_limit: f32) -> [u8; LEVELS] {
    let (x0, y0, x1, y1) = bounds;
    let area = (x1 - x0) * (y1 - y0);

    let mut histogram = [0u32; LEVELS];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let clip_count = ((clip_limit * area as f32 / LEVELS as f32) as u32).max(1);
    clip_histogram(&mut histogram, clip_count);

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; LEVELS];
    let mut cumulative = 0u32;
    for (slot, count) in lut.iter_mut().zip(histogram.iter()) {
        cumulative += count;
        *slot = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Clips every bin at `clip_count` and spreads the excess uniformly, the
/// remainder going to the lowest bins.
fn clip_histogram(histogram: &mut [u32; LEVELS], clip_count: u32) {
    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > clip_count {
            excess += *count - clip_count;
            *count = clip_count;
        }
    }

    let uniform_increment = excess / LEVELS as u32;
    let remainder = (excess % LEVELS as u32) as usize;
    for (i, count) in histogram.iter_mut().enumerate() {
        *count += uniform_increment;
        if i < remainder {
            *count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};

    fn gradient_image(width: u32, height: u32, base: u8, span: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([base + ((x + y * width) % span) as u8])
        })
    }

    #[test]
    fn test_apply_clahe_basic() {
        let img = gradient_image(64, 64, 40, 100);
        let result = apply_clahe(&img, 2.0, (8, 8)).unwrap();

        assert_eq!(result.clip_limit, 2.0);
        assert_eq!(result.tile_grid, (8, 8));
        assert_eq!(result.tile_size, (8, 8));
        assert_eq!(result.image.dimensions(), (64, 64));
    }

    #[test]
    fn test_apply_clahe_invalid_parameters() {
        let img = gradient_image(16, 16, 0, 16);

        assert!(apply_clahe(&img, 0.0, (8, 8)).is_err());
        assert!(apply_clahe(&img, -1.0, (8, 8)).is_err());
        assert!(apply_clahe(&img, f32::NAN, (8, 8)).is_err());
        assert!(apply_clahe(&img, 2.0, (0, 8)).is_err());
        assert!(apply_clahe(&img, 2.0, (8, 0)).is_err());
    }

    #[test]
    fn test_apply_clahe_empty_image() {
        let img = GrayImage::new(0, 0);
        assert_eq!(
            apply_clahe(&img, 2.0, (8, 8)).unwrap_err(),
            PreprocessingError::EmptyImage
        );
    }

    #[test]
    fn test_apply_clahe_stretches_low_contrast_tile() {
        // 16 grey levels between 100 and 115, a single tile.
        let img = gradient_image(8, 8, 100, 16);
        let result = apply_clahe(&img, 2.0, (1, 1)).unwrap();

        let (min_in, max_in) = (100u8, 115u8);
        let min_out = result.image.pixels().map(|p| p[0]).min().unwrap();
        let max_out = result.image.pixels().map(|p| p[0]).max().unwrap();
        assert!(max_out - min_out > max_in - min_in);
    }

    #[test]
    fn test_apply_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(4, 4, Luma([200]));
        let result = apply_clahe(&img, 2.0, (8, 8)).unwrap();

        // A grid finer than the image degrades to one-pixel tiles.
        assert_eq!(result.tile_size, (1, 1));
        let first = result.image.get_pixel(0, 0)[0];
        assert!(result.image.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_equalize_twice_preserves_dimensions() {
        let img = DynamicImage::ImageLuma8(gradient_image(50, 30, 10, 200));
        let once = equalize(&img, 32, 2.0, (8, 8)).unwrap();
        let twice = equalize(&DynamicImage::ImageLuma8(once.image), 32, 2.0, (8, 8)).unwrap();

        assert_eq!(twice.image.dimensions(), (32, 32));
    }

    #[test]
    fn test_resize_to_square_converts_color() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let gray = resize_to_square(&img, 24).unwrap();

        assert_eq!(gray.dimensions(), (24, 24));
    }

    #[test]
    fn test_resize_to_square_rejects_bad_input() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert_eq!(resize_to_square(&empty, 8).unwrap_err(), PreprocessingError::EmptyImage);

        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        assert!(matches!(
            resize_to_square(&img, 0),
            Err(PreprocessingError::InvalidParameters { .. })
        ));
        assert!(matches!(
            resize_to_square(&img, MAX_IMAGE_SIZE + 1),
            Err(PreprocessingError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_tile_layout() {
        assert_eq!(tile_layout(224, 8), (28, 8));
        assert_eq!(tile_layout(4, 8), (1, 4));
        assert_eq!(tile_layout(10, 3), (4, 3));
    }

    #[test]
    fn test_neighbours_clamp_at_borders() {
        assert_eq!(neighbours(0, 8, 4), (0, 0, 0.5));
        let (i0, i1, w) = neighbours(31, 8, 4);
        assert_eq!((i0, i1), (3, 3));
        assert!(w > 0.0);
        let (i0, i1, w) = neighbours(12, 8, 4);
        assert_eq!((i0, i1), (1, 2));
        assert!((w - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_histogram_preserves_total() {
        let mut histogram = [0u32; LEVELS];
        histogram[10] = 500;
        histogram[20] = 12;
        clip_histogram(&mut histogram, 8);

        assert_eq!(histogram.iter().sum::<u32>(), 512);
        assert!(histogram[10] <= 8 + 2);
    }
}
