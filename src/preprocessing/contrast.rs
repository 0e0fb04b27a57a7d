//! Contrast-control signal derived from an equalized intensity.

/// Default global contrast constant.
pub const DEFAULT_CONTRAST_CONSTANT: f64 = 100.0;

/// Linear contrast-control law: `pixel_value * contrast_constant / 255`.
///
/// No range is enforced; constants above 255 yield values beyond the
/// intensity universe, which the fuzzy engine treats as outside every set.
///
/// # Examples
///
/// ```
/// use fuzzy_clahe::preprocessing::contrast_control;
///
/// assert_eq!(contrast_control(255, 100.0), 100.0);
/// assert_eq!(contrast_control(0, 100.0), 0.0);
/// ```
pub fn contrast_control(pixel_value: u8, contrast_constant: f64) -> f64 {
    pixel_value as f64 * contrast_constant / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrast_control_law() {
        for &v in &[0u8, 63, 127, 191, 255] {
            for &c in &[0.0, 100.0, 255.0] {
                let expected = v as f64 * c / 255.0;
                assert!((contrast_control(v, c) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_contrast_control_identity_at_255() {
        for v in 0..=255u8 {
            assert!((contrast_control(v, 255.0) - v as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_contrast_control_is_unbounded() {
        assert!(contrast_control(255, 1_000.0) > 255.0);
        assert!(contrast_control(200, -50.0) < 0.0);
    }
}
