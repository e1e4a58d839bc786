//! Saliency-driven cropping and resizing to the canonical resolution.

mod analyzer;
mod features;

pub use analyzer::{CropAnalyzer, CropRect, CropScore};
pub use features::{feature_map, FeatureMap};

use image::{imageops::FilterType, DynamicImage};
use thiserror::Error;

use crate::error::{Error, Result};

/// Reasons the analyzer could not propose a crop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    /// The requested crop has a zero dimension.
    #[error("invalid crop dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The source image has no pixels.
    #[error("source image is empty")]
    EmptyImage,

    /// The source image is smaller than the requested crop.
    #[error("image {image_width}x{image_height} is smaller than crop {width}x{height}")]
    ImageTooSmall {
        image_width: u32,
        image_height: u32,
        width: u32,
        height: u32,
    },

    /// No candidate crop fits inside the analysed image.
    #[error("no candidate crop fits the image")]
    NoCandidates,
}

/// Result of asking the analyzer for a crop region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropOutcome {
    /// The analyzer selected this region of the source image.
    Cropped(CropRect),
    /// No crop is available; the full image is used.
    Unavailable(CropError),
}

/// Tuning for the saliency analyzer.
#[derive(Debug, Clone)]
pub struct CropConfig {
    /// Weight of edge detail in the final score.
    pub detail_weight: f64,

    /// Reference skin colour as a normalized RGB direction.
    pub skin_color: [f64; 3],
    pub skin_bias: f64,
    pub skin_brightness_min: f64,
    pub skin_brightness_max: f64,
    /// Similarity above which a pixel counts as skin (0.0-1.0, exclusive of 1.0).
    pub skin_threshold: f64,
    pub skin_weight: f64,

    pub saturation_brightness_min: f64,
    pub saturation_brightness_max: f64,
    /// HSL saturation above which a pixel counts as saturated (0.0-1.0, exclusive of 1.0).
    pub saturation_threshold: f64,
    pub saturation_bias: f64,
    pub saturation_weight: f64,

    /// Canny low threshold for the detail plane.
    pub edge_low_threshold: f32,
    /// Canny high threshold for the detail plane.
    pub edge_high_threshold: f32,

    /// Sample every n-th feature pixel when scoring.
    pub score_down_sample: u32,
    /// Sliding step in pixels between candidate crops.
    pub step: u32,
    pub scale_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,

    /// Fraction of the crop near its border that is penalized.
    pub edge_radius: f64,
    pub edge_weight: f64,
    /// Importance of feature pixels outside the candidate crop.
    pub outside_importance: f64,
    pub rule_of_thirds: bool,

    /// Downscale the source before analysis.
    pub prescale: bool,
    /// Shorter side, in pixels, of the prescaled analysis image.
    pub prescale_min: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            detail_weight: 0.2,
            skin_color: [0.78, 0.57, 0.44],
            skin_bias: 0.01,
            skin_brightness_min: 0.2,
            skin_brightness_max: 1.0,
            skin_threshold: 0.8,
            skin_weight: 1.8,
            saturation_brightness_min: 0.05,
            saturation_brightness_max: 0.9,
            saturation_threshold: 0.4,
            saturation_bias: 0.2,
            saturation_weight: 0.3,
            edge_low_threshold: 50.0,
            edge_high_threshold: 100.0,
            score_down_sample: 8,
            step: 8,
            scale_step: 0.1,
            min_scale: 0.9,
            max_scale: 1.0,
            edge_radius: 0.4,
            edge_weight: -20.0,
            outside_importance: -0.5,
            rule_of_thirds: true,
            prescale: true,
            prescale_min: 400.0,
        }
    }
}

impl CropConfig {
    /// Validate the analyzer configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a sampling or scale parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::invalid("crop.step", "must be greater than 0"));
        }

        if self.score_down_sample == 0 {
            return Err(Error::invalid(
                "crop.score_down_sample",
                "must be greater than 0",
            ));
        }

        if self.scale_step <= 0.0 {
            return Err(Error::invalid("crop.scale_step", "must be greater than 0"));
        }

        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale && self.max_scale <= 1.0) {
            return Err(Error::invalid(
                "crop.min_scale",
                "must satisfy 0 < min_scale <= max_scale <= 1",
            ));
        }

        if !(0.0..1.0).contains(&self.skin_threshold) {
            return Err(Error::invalid(
                "crop.skin_threshold",
                "must be in [0.0, 1.0)",
            ));
        }

        if !(0.0..1.0).contains(&self.saturation_threshold) {
            return Err(Error::invalid(
                "crop.saturation_threshold",
                "must be in [0.0, 1.0)",
            ));
        }

        if self.prescale && self.prescale_min < 1.0 {
            return Err(Error::invalid(
                "crop.prescale_min",
                "must be at least 1 pixel",
            ));
        }

        Ok(())
    }
}

/// Ask the analyzer for the best `target_width` x `target_height` crop of `img`.
#[must_use]
pub fn select_crop(
    analyzer: &CropAnalyzer,
    img: &DynamicImage,
    target_height: u32,
    target_width: u32,
) -> CropOutcome {
    match analyzer.find_best_crop(img, target_width, target_height) {
        Ok(rect) => CropOutcome::Cropped(rect),
        Err(reason) => CropOutcome::Unavailable(reason),
    }
}

/// Crop `img` to its most salient region and resize it to exactly
/// `target_width` x `target_height` using Lanczos3.
///
/// When no crop is available the whole image is resized instead.
#[must_use]
pub fn normalize(
    img: &DynamicImage,
    target_height: u32,
    target_width: u32,
    analyzer: &CropAnalyzer,
) -> DynamicImage {
    let cropped;
    let working = match select_crop(analyzer, img, target_height, target_width) {
        CropOutcome::Cropped(rect) => {
            tracing::debug!(
                "Cropping to {}x{} at ({}, {})",
                rect.width,
                rect.height,
                rect.x,
                rect.y
            );
            cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
            &cropped
        }
        CropOutcome::Unavailable(reason) => {
            tracing::debug!("Crop unavailable ({reason}), resizing full image");
            img
        }
    };

    working.resize_exact(target_width, target_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CropConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_scale_range() {
        let config = CropConfig {
            min_scale: 1.2,
            ..CropConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = CropConfig {
            step: 0,
            ..CropConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_crop_unavailable_for_small_image() {
        let analyzer = CropAnalyzer::default();
        let img = DynamicImage::new_rgb8(10, 10);

        let outcome = select_crop(&analyzer, &img, 32, 32);

        assert!(matches!(
            outcome,
            CropOutcome::Unavailable(CropError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn test_normalize_fallback_keeps_target_dimensions() {
        let analyzer = CropAnalyzer::default();
        let img = DynamicImage::new_rgb8(10, 7);

        let out = normalize(&img, 32, 24, &analyzer);

        assert_eq!(out.dimensions(), (24, 32));
    }

    #[test]
    fn test_normalize_after_crop() {
        let analyzer = CropAnalyzer::default();
        let img = DynamicImage::new_rgb8(200, 100);

        let out = normalize(&img, 50, 50, &analyzer);

        assert_eq!(out.dimensions(), (50, 50));
    }

    fn is_red(pixel: [u8; 3]) -> bool {
        pixel[0] > 150 && pixel[1] < 80 && pixel[2] < 80
    }

    #[test]
    fn test_normalize_keeps_salient_region() {
        // Black canvas with a red checkerboard near the right edge.
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(300, 100, |x, y| {
            let in_patch = (210..290).contains(&x) && (20..80).contains(&y);
            if in_patch && ((x / 10) + (y / 10)) % 2 == 0 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 0])
            }
        }));
        let analyzer = CropAnalyzer::default();

        let centre = img.crop_imm(100, 0, 100, 100).to_rgb8();
        assert!(!centre.pixels().any(|p| is_red(p.0)));

        let out = normalize(&img, 50, 50, &analyzer).to_rgb8();

        assert_eq!(out.dimensions(), (50, 50));
        assert!(out.pixels().any(|p| is_red(p.0)));
    }

    #[test]
    fn test_normalize_non_square_target() {
        let analyzer = CropAnalyzer::default();
        let img = DynamicImage::new_rgb8(120, 90);

        let out = normalize(&img, 20, 40, &analyzer);

        assert_eq!(out.width(), 40);
        assert_eq!(out.height(), 20);
    }
}
