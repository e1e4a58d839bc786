//! Content-aware crop selection.
//!
//! Candidate crops with the requested aspect ratio are slid across a
//! downscaled copy of the image and scored against its skin, detail and
//! saturation planes. Pixels near the centre and on the rule-of-thirds lines
//! count more, pixels near the crop border count less and pixels outside the
//! crop count against it.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use super::features::{feature_map, FeatureMap};
use super::{CropConfig, CropError};

/// A rectangular region in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Score components of a candidate crop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropScore {
    pub detail: f64,
    pub skin: f64,
    pub saturation: f64,
    pub total: f64,
}

/// Finds the most salient crop of an image.
///
/// The analyzer holds only its configuration and can be shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct CropAnalyzer {
    config: CropConfig,
}

impl CropAnalyzer {
    /// Create an analyzer with the given tuning.
    #[must_use]
    pub const fn new(config: CropConfig) -> Self {
        Self { config }
    }

    /// The analyzer's tuning.
    #[must_use]
    pub const fn config(&self) -> &CropConfig {
        &self.config
    }

    /// Find the best crop with the aspect ratio of `width` x `height`.
    ///
    /// The returned region is as large as the image allows (down to
    /// `min_scale`) and always lies inside the image.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero, the image is smaller than the
    /// requested size, or no candidate fits.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn find_best_crop(
        &self,
        img: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<CropRect, CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::InvalidDimensions { width, height });
        }

        let (image_width, image_height) = img.dimensions();
        if image_width == 0 || image_height == 0 {
            return Err(CropError::EmptyImage);
        }

        if image_width < width || image_height < height {
            return Err(CropError::ImageTooSmall {
                image_width,
                image_height,
                width,
                height,
            });
        }

        let scale = (f64::from(image_width) / f64::from(width))
            .min(f64::from(image_height) / f64::from(height));

        let prescale = if self.config.prescale {
            (self.config.prescale_min / f64::from(image_width.min(image_height))).min(1.0)
        } else {
            1.0
        };

        let analysed = if prescale < 1.0 {
            img.resize_exact(
                chop(f64::from(image_width) * prescale).max(1),
                chop(f64::from(image_height) * prescale).max(1),
                FilterType::Triangle,
            )
            .to_rgba8()
        } else {
            img.to_rgba8()
        };

        let crop_width = chop(f64::from(width) * scale * prescale).max(1);
        let crop_height = chop(f64::from(height) * scale * prescale).max(1);
        let min_scale = self
            .config
            .max_scale
            .min((1.0 / scale).max(self.config.min_scale));

        let features = feature_map(&analysed, &self.config);

        let (best, score) = self
            .candidates(analysed.dimensions(), crop_width, crop_height, min_scale)
            .into_iter()
            .map(|crop| (crop, self.score(&features, crop)))
            .max_by(|a, b| a.1.total.total_cmp(&b.1.total))
            .ok_or(CropError::NoCandidates)?;

        tracing::debug!("Best crop {best:?} with score {:.4}", score.total);

        // Map back to source coordinates.
        let width = chop(f64::from(best.width) / prescale).clamp(1, image_width);
        let height = chop(f64::from(best.height) / prescale).clamp(1, image_height);

        Ok(CropRect {
            x: chop(f64::from(best.x) / prescale).min(image_width - width),
            y: chop(f64::from(best.y) / prescale).min(image_height - height),
            width,
            height,
        })
    }

    /// Enumerate crops of every scale between `max_scale` and `min_scale`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn candidates(
        &self,
        (width, height): (u32, u32),
        crop_width: u32,
        crop_height: u32,
        min_scale: f64,
    ) -> Vec<CropRect> {
        let step = self.config.step.max(1) as usize;
        let scales = ((self.config.max_scale - min_scale) / self.config.scale_step + 1e-9)
            .floor()
            .max(0.0) as u32;

        let mut crops = Vec::new();
        for i in 0..=scales {
            let scale = f64::from(i).mul_add(-self.config.scale_step, self.config.max_scale);
            let w = chop(f64::from(crop_width) * scale).max(1);
            let h = chop(f64::from(crop_height) * scale).max(1);
            if w > width || h > height {
                continue;
            }

            for y in (0..=height - h).step_by(step) {
                for x in (0..=width - w).step_by(step) {
                    crops.push(CropRect {
                        x,
                        y,
                        width: w,
                        height: h,
                    });
                }
            }
        }

        crops
    }

    fn score(&self, features: &FeatureMap, crop: CropRect) -> CropScore {
        let config = &self.config;
        let down_sample = config.score_down_sample.max(1) as usize;
        let (width, height) = features.dimensions();

        let mut score = CropScore::default();
        for y in (0..height).step_by(down_sample) {
            for x in (0..width).step_by(down_sample) {
                let [skin, detail, saturation] =
                    features.get_pixel(x, y).0.map(|v| f64::from(v) / 255.0);
                let importance = self.importance(crop, x, y);

                score.skin += skin * (detail + config.skin_bias) * importance;
                score.detail += detail * importance;
                score.saturation += saturation * (detail + config.saturation_bias) * importance;
            }
        }

        score.total = config.saturation_weight.mul_add(
            score.saturation,
            score
                .detail
                .mul_add(config.detail_weight, score.skin * config.skin_weight),
        ) / (f64::from(crop.width) * f64::from(crop.height));

        score
    }

    fn importance(&self, crop: CropRect, x: u32, y: u32) -> f64 {
        let config = &self.config;
        if !crop.contains(x, y) {
            return config.outside_importance;
        }

        let xf = f64::from(x - crop.x) / f64::from(crop.width);
        let yf = f64::from(y - crop.y) / f64::from(crop.height);
        let px = (0.5 - xf).abs() * 2.0;
        let py = (0.5 - yf).abs() * 2.0;

        let dx = (px - 1.0 + config.edge_radius).max(0.0);
        let dy = (py - 1.0 + config.edge_radius).max(0.0);
        let d = dx.mul_add(dx, dy * dy) * config.edge_weight;

        let mut s = 1.41 - px.hypot(py);
        if config.rule_of_thirds {
            s += (s + d + 0.5).max(0.0) * 1.2 * (thirds(px) + thirds(py));
        }

        s + d
    }
}

/// Peaks when `x` lies on a third of the crop.
fn thirds(x: f64) -> f64 {
    let x = (((x - 1.0 / 3.0 + 1.0) % 2.0).mul_add(0.5, -0.5)) * 16.0;
    x.mul_add(-x, 1.0).max(0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn chop(value: f64) -> u32 {
    value.max(0.0) as u32
}
