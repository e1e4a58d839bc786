//! Configured conversion between image files, tensors and training patterns.

mod maker;

pub use maker::{Config, ImageMaker};
