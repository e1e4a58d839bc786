//! Image loading utilities.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use ndarray::Array3;

use crate::crop::{normalize, CropAnalyzer};
use crate::error::{Error, Result};

use super::{ImageTensor, CHANNEL_MAX, RGB_CHANNELS};

/// Load an image from disk and convert it to a normalized tensor.
///
/// The image is:
/// 1. Opened from `path` (relative paths resolve against the working directory)
/// 2. Decoded as JPEG or PNG, detected from its magic bytes
/// 3. Cropped to its most salient `side` x `side` region and resized with Lanczos3
/// 4. Flattened to a `(side, side, 3)` tensor with values in [0, 1]
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read, and
/// [`Error::ImageLoad`] if its contents are not a supported image.
pub fn load_image<P: AsRef<Path>>(
    path: P,
    side: u32,
    analyzer: &CropAnalyzer,
) -> Result<ImageTensor> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|source| Error::io(path, source))?;

    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|source| Error::io(path, source))?
        .decode()
        .map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let normalized = normalize(&img, side, side, analyzer);

    Ok(image_to_tensor(&normalized))
}

/// Convert a `DynamicImage` to a normalized HWC tensor.
///
/// The tensor is square with side `max(width, height)`. Each channel is read
/// at 16-bit precision, premultiplied by alpha and shifted down to 8 bits
/// before dividing by 255. Alpha itself is dropped, so transparent pixels
/// read as black, as do positions outside a non-square image.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn image_to_tensor(img: &DynamicImage) -> ImageTensor {
    let rgba = img.to_rgba16();
    let side = rgba.width().max(rgba.height()) as usize;

    // Safe: x and y are bounded by the image side which fits in u32
    Array3::from_shape_fn((side, side, RGB_CHANNELS), |(y, x, c)| {
        rgba.get_pixel_checked(x as u32, y as u32)
            .map_or(0.0, |pixel| {
                f64::from(premultiply(pixel[c], pixel[3]) >> 8) / CHANNEL_MAX
            })
    })
}

/// Scale a 16-bit sample by a 16-bit alpha.
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn premultiply(sample: u16, alpha: u16) -> u16 {
    // Safe: the product divided by 0xffff never exceeds `sample`
    (sample as u32 * alpha as u32 / 0xffff) as u16
}
