//! Image saving utilities.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use image::{codecs::jpeg::JpegEncoder, DynamicImage, Rgb, RgbImage};
use ndarray::{ArrayBase, Data, Dimension};

use crate::error::{Error, Result};

use super::{CHANNEL_MAX, RGB_CHANNELS};

/// Save a tensor as a JPEG file.
///
/// The tensor is:
/// 1. Checked to hold exactly `width * height * 3` values
/// 2. Denormalized from [0, 1] to [0, 255], pixel by pixel in row-major order
/// 3. Written as a baseline JPEG with the encoder's default quality
///
/// The output file (and any missing parent directory) is created, or
/// truncated if it already exists.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the tensor length is wrong,
/// [`Error::Io`] if the file cannot be created and [`Error::ImageSave`] if
/// the JPEG encoder fails.
pub fn save_image<S, D, P>(tensor: &ArrayBase<S, D>, path: P, width: u32, height: u32) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let img = tensor_to_image(tensor, width, height)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
    }

    let file = fs::File::create(path).map_err(|source| Error::io(path, source))?;
    let mut output = BufWriter::new(file);

    let encoder = JpegEncoder::new(&mut output);
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(encoder)
        .map_err(|source| Error::ImageSave {
            path: path.to_path_buf(),
            source,
        })?;

    // Flush explicitly so write errors are not lost on drop.
    output
        .into_inner()
        .map_err(|err| Error::io(path, err.into_error()))?;

    Ok(())
}

/// Convert a normalized tensor to a `width` x `height` RGB image.
///
/// Values are read in the tensor's logical order, three per pixel.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] unless the tensor holds exactly
/// `width * height * 3` values.
pub fn tensor_to_image<S, D>(tensor: &ArrayBase<S, D>, width: u32, height: u32) -> Result<RgbImage>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let expected = width as usize * height as usize * RGB_CHANNELS;
    if tensor.len() != expected {
        return Err(Error::ShapeMismatch {
            expected,
            actual: tensor.len(),
        });
    }

    let values: Vec<f64> = tensor.iter().copied().collect();
    let mut img = RgbImage::new(width, height);

    for (pixel, rgb) in img.pixels_mut().zip(values.chunks_exact(RGB_CHANNELS)) {
        *pixel = Rgb([denormalize(rgb[0]), denormalize(rgb[1]), denormalize(rgb[2])]);
    }

    Ok(img)
}

/// Denormalize a value from [0, 1] to [0, 255], truncating and clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f64) -> u8 {
    // NaN saturates to 0 in the cast
    (value * CHANNEL_MAX).clamp(0.0, CHANNEL_MAX) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use ndarray::{Array1, Array3};
    use tempfile::TempDir;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(0.0), 0);
        assert_eq!(denormalize(0.5), 127);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-0.5), 0);
        assert_eq!(denormalize(2.0), 255);
        assert_eq!(denormalize(f64::NAN), 0);
    }

    #[test]
    fn test_tensor_to_image_row_major() {
        // 3 wide, 2 high: the fifth pixel is (x=1, y=1)
        let mut tensor = Array1::<f64>::zeros(3 * 2 * 3);
        tensor[4 * 3] = 1.0;
        tensor[4 * 3 + 2] = 0.2;

        let img = tensor_to_image(&tensor, 3, 2).unwrap();

        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 51]);
        assert_eq!(img.get_pixel(2, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let tensor = Array1::<f64>::zeros(10);
        let result = tensor_to_image(&tensor, 2, 2);

        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expected: 12,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_short_tensor_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let tensor = Array1::<f64>::zeros(5);

        assert!(save_image(&tensor, &path, 2, 2).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_save_white_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("white.jpg");
        let tensor = Array3::<f64>::ones((32, 32, 3));

        save_image(&tensor, &path, 32, 32).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert!(decoded
            .to_rgb8()
            .pixels()
            .all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        std::fs::write(&path, vec![0u8; 100_000]).unwrap();

        save_image(&Array3::<f64>::zeros((8, 8, 3)), &path, 8, 8).unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() < 100_000);
        assert_eq!(image::open(&path).unwrap().dimensions(), (8, 8));
    }
}
