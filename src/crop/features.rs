//! Per-pixel saliency features used to score crop candidates.

use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use imageproc::edges::canny;

use super::CropConfig;

/// Feature planes packed into one buffer: red = skin, green = detail, blue = saturation.
pub type FeatureMap = RgbImage;

/// Canny needs a 3x3 neighbourhood.
const MIN_EDGE_SIDE: u32 = 3;

/// Build the skin, detail and saturation planes for `img`.
#[must_use]
pub fn feature_map(img: &RgbaImage, config: &CropConfig) -> FeatureMap {
    let (width, height) = img.dimensions();
    let lightness = lightness_image(img);

    let edges = (width >= MIN_EDGE_SIDE && height >= MIN_EDGE_SIDE).then(|| {
        canny(
            &lightness,
            config.edge_low_threshold,
            config.edge_high_threshold,
        )
    });

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = img.get_pixel(x, y).0;
        let rgb = [r, g, b];
        let light = f64::from(lightness.get_pixel(x, y)[0]) / 255.0;

        let skin = skin_channel(rgb, light, config);
        let detail = edges.as_ref().map_or(0, |e| e.get_pixel(x, y)[0]);
        let saturation = saturation_channel(rgb, light, config);

        Rgb([skin, detail, saturation])
    })
}

/// Rec. 709 luminance of every pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lightness_image(img: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, _] = img.get_pixel(x, y).0;
        let luma = 0.2126_f64
            .mul_add(f64::from(r), 0.7152_f64.mul_add(f64::from(g), 0.0722 * f64::from(b)))
            .clamp(0.0, 255.0) as u8;
        Luma([luma])
    })
}

fn skin_channel(rgb: [u8; 3], lightness: f64, config: &CropConfig) -> u8 {
    let skin = skin_similarity(rgb, config.skin_color);
    let lit = (config.skin_brightness_min..=config.skin_brightness_max).contains(&lightness);

    if skin > config.skin_threshold && lit {
        to_channel((skin - config.skin_threshold) * (255.0 / (1.0 - config.skin_threshold)))
    } else {
        0
    }
}

fn saturation_channel(rgb: [u8; 3], lightness: f64, config: &CropConfig) -> u8 {
    let saturation = hsl_saturation(rgb);
    let lit = (config.saturation_brightness_min..=config.saturation_brightness_max)
        .contains(&lightness);

    if saturation > config.saturation_threshold && lit {
        to_channel(
            (saturation - config.saturation_threshold)
                * (255.0 / (1.0 - config.saturation_threshold)),
        )
    } else {
        0
    }
}

/// One minus the distance between the pixel's colour direction and `reference`.
fn skin_similarity(rgb: [u8; 3], reference: [f64; 3]) -> f64 {
    let [r, g, b] = rgb.map(f64::from);
    let magnitude = r.mul_add(r, g.mul_add(g, b * b)).sqrt();

    // black has no direction
    if magnitude <= f64::EPSILON {
        return 0.0;
    }

    let rd = r / magnitude - reference[0];
    let gd = g / magnitude - reference[1];
    let bd = b / magnitude - reference[2];

    1.0 - rd.mul_add(rd, gd.mul_add(gd, bd * bd)).sqrt()
}

fn hsl_saturation(rgb: [u8; 3]) -> f64 {
    let [r, g, b] = rgb.map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if delta <= f64::EPSILON {
        return 0.0;
    }

    let lightness = (max + min) / 2.0;
    if lightness > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
