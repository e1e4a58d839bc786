//! # imaker
//!
//! Turns image files into fixed-size numeric tensors for neural-network
//! training, and tensors back into viewable images.
//!
//! Every decoded image is cropped to its most salient region, resized to a
//! canonical square with Lanczos3 and flattened to `f64` values in [0, 1],
//! laid out row by row as R, G, B per pixel. Two directories of images can
//! be paired by file name into (input, target) training patterns.
//!
//! ## Example
//!
//! ```no_run
//! use imaker::{Config, ImageMaker};
//!
//! # fn main() -> imaker::Result<()> {
//! let config = Config {
//!     learn_dir: "data/noisy".into(),
//!     answer_dir: "data/clean".into(),
//!     output_file: "prediction.jpg".into(),
//!     image_width: 64,
//!     image_height: 64,
//!     ..Config::default()
//! };
//! let maker = ImageMaker::new(config)?;
//!
//! let patterns = maker.make_patterns()?;
//! maker.encode(&patterns[0].target)?;
//! # Ok(())
//! # }
//! ```

pub mod crop;
pub mod dataset;
pub mod error;
pub mod image;
pub mod pipeline;

pub use crate::image::ImageTensor;
pub use dataset::{DataSet, Pattern};
pub use error::{Error, Result};
pub use pipeline::{Config, ImageMaker};
