//! Image/tensor conversion utility bound to one configuration.

use std::path::{Path, PathBuf};

use ndarray::{ArrayBase, Data, Dimension};

use crate::crop::{CropAnalyzer, CropConfig};
use crate::dataset::{self, DataSet, Pattern};
use crate::error::{Error, Result};
use crate::image::{self, ImageTensor};

/// Configuration for image/tensor conversion.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the training inputs.
    pub learn_dir: PathBuf,

    /// Directory holding the training targets, matched to inputs by file name.
    pub answer_dir: PathBuf,

    /// Destination of [`ImageMaker::encode`].
    pub output_file: PathBuf,

    /// Width of encoded images.
    pub image_width: u32,

    /// Height of encoded images.
    pub image_height: u32,

    /// Decode the files of a directory on the rayon thread pool.
    pub parallel: bool,

    /// Saliency crop tuning.
    pub crop: CropConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learn_dir: PathBuf::from("learn"),
            answer_dir: PathBuf::from("answer"),
            output_file: PathBuf::from("output.jpg"),
            image_width: 64,
            image_height: 64,
            parallel: false,
            crop: CropConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.image_width == 0 {
            return Err(Error::invalid("image_width", "must be greater than 0"));
        }

        if self.image_height == 0 {
            return Err(Error::invalid("image_height", "must be greater than 0"));
        }

        self.crop.validate()
    }

    /// Side of the square every decoded image is normalized to.
    ///
    /// Decoding always produces a square tensor; with unequal width and
    /// height the larger one wins.
    #[must_use]
    pub fn square_side(&self) -> u32 {
        self.image_width.max(self.image_height)
    }
}

/// Converts images to tensors and back with fixed dimensions.
pub struct ImageMaker {
    config: Config,
    analyzer: CropAnalyzer,
}

impl ImageMaker {
    /// Create a converter with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        if config.image_width != config.image_height {
            tracing::warn!(
                "Non-square size {}x{}: decoded tensors are {side}x{side}, encode expects {}x{}",
                config.image_width,
                config.image_height,
                config.image_width,
                config.image_height,
                side = config.square_side(),
            );
        }

        tracing::debug!("Initializing image maker with config: {config:?}");

        let analyzer = CropAnalyzer::new(config.crop.clone());

        Ok(Self { config, analyzer })
    }

    /// The configuration this converter was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Decode an image file into a square tensor of side
    /// [`Config::square_side`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn decode<P: AsRef<Path>>(&self, path: P) -> Result<ImageTensor> {
        image::load_image(path, self.config.square_side(), &self.analyzer)
    }

    /// Encode a tensor to the configured output file as a JPEG.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor does not hold exactly
    /// `image_width * image_height * 3` values or the file cannot be written.
    pub fn encode<S, D>(&self, tensor: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        tracing::info!("Saving output to: {}", self.config.output_file.display());

        image::save_image(
            tensor,
            &self.config.output_file,
            self.config.image_width,
            self.config.image_height,
        )
    }

    /// Decode every regular file in `dir`, skipping files that fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn load_directory<P: AsRef<Path>>(&self, dir: P) -> Result<DataSet> {
        dataset::load_directory(dir, |path| self.decode(path), self.config.parallel)
    }

    /// Build training patterns from two directories matched by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be listed.
    pub fn build_patterns<P, Q>(&self, learn_dir: P, answer_dir: Q) -> Result<Vec<Pattern>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let learn = self.load_directory(learn_dir)?;
        let answer = self.load_directory(answer_dir)?;

        Ok(dataset::pair(learn, answer))
    }

    /// Build training patterns from the configured directories.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be listed.
    pub fn make_patterns(&self) -> Result<Vec<Pattern>> {
        self.build_patterns(&self.config.learn_dir, &self.config.answer_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &Path, side: u32) -> Config {
        Config {
            learn_dir: dir.join("learn"),
            answer_dir: dir.join("answer"),
            output_file: dir.join("out.jpg"),
            image_width: side,
            image_height: side,
            ..Config::default()
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_image(path: &Path, seed: u32) {
        RgbImage::from_fn(40, 30, |x, y| {
            Rgb([((x + seed) * 6 % 256) as u8, (y * 8 % 256) as u8, (seed * 50 % 256) as u8])
        })
        .save(path)
        .unwrap();
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            image_width: 0,
            ..Config::default()
        };
        assert!(matches!(
            ImageMaker::new(config),
            Err(Error::InvalidParameter { .. })
        ));

        let config = Config {
            image_height: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_square_side_uses_larger_dimension() {
        let config = Config {
            image_width: 16,
            image_height: 24,
            ..Config::default()
        };
        assert_eq!(config.square_side(), 24);
    }

    #[test]
    fn test_decode_shape_and_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.png");
        write_image(&path, 1);

        let maker = ImageMaker::new(config_in(dir.path(), 16)).unwrap();
        let tensor = maker.decode(&path).unwrap();

        assert_eq!(tensor.len(), 16 * 16 * 3);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_decode_non_square_config_is_square() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.png");
        write_image(&path, 2);

        let config = Config {
            image_width: 8,
            image_height: 12,
            ..config_in(dir.path(), 8)
        };
        let maker = ImageMaker::new(config).unwrap();
        let tensor = maker.decode(&path).unwrap();

        assert_eq!(tensor.shape(), &[12, 12, 3]);
    }

    #[test]
    fn test_encode_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let maker = ImageMaker::new(config_in(dir.path(), 32)).unwrap();

        maker
            .encode(&ndarray::Array1::<f64>::ones(32 * 32 * 3))
            .unwrap();

        let written = ::image::open(dir.path().join("out.jpg")).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (32, 32));
        assert!(written.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        let dir = TempDir::new().unwrap();
        let maker = ImageMaker::new(config_in(dir.path(), 4)).unwrap();

        let result = maker.encode(&ndarray::Array1::<f64>::zeros(4 * 4 * 3 - 1));

        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert!(!dir.path().join("out.jpg").exists());
    }

    #[test]
    fn test_decode_then_encode_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.jpg");
        write_image(&path, 3);

        let maker = ImageMaker::new(config_in(dir.path(), 24)).unwrap();
        let tensor = maker.decode(&path).unwrap();
        maker.encode(&tensor).unwrap();

        let written = ::image::open(dir.path().join("out.jpg")).unwrap();
        assert_eq!((written.width(), written.height()), (24, 24));
    }

    #[test]
    fn test_make_patterns_matches_by_file_name() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 8);
        fs::create_dir(&config.learn_dir).unwrap();
        fs::create_dir(&config.answer_dir).unwrap();

        write_image(&config.learn_dir.join("a.jpg"), 1);
        write_image(&config.learn_dir.join("b.jpg"), 2);
        write_image(&config.answer_dir.join("a.jpg"), 3);
        write_image(&config.answer_dir.join("c.jpg"), 4);

        let maker = ImageMaker::new(config).unwrap();
        let patterns = maker.make_patterns().unwrap();

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].key, "a.jpg");
        assert_eq!(patterns[0].input.len(), 8 * 8 * 3);
        assert_eq!(patterns[0].target.len(), 8 * 8 * 3);
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            parallel: true,
            ..config_in(dir.path(), 8)
        };
        fs::create_dir(&config.learn_dir).unwrap();
        write_image(&config.learn_dir.join("good.png"), 1);
        fs::write(config.learn_dir.join("broken.png"), b"\x89PNG but not really").unwrap();

        let maker = ImageMaker::new(config).unwrap();
        let loaded = maker.load_directory(&maker.config().learn_dir).unwrap();

        assert_eq!(loaded.keys().collect::<Vec<_>>(), ["good.png"]);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let maker = ImageMaker::new(config_in(dir.path(), 8)).unwrap();

        assert!(matches!(
            maker.make_patterns(),
            Err(Error::Io { .. })
        ));
    }
}
