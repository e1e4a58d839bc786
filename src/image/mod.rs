//! Image decoding to tensors and tensor encoding back to images.

mod load;
mod save;

pub use load::{image_to_tensor, load_image};
pub use save::{save_image, tensor_to_image};

use ndarray::Array3;

/// Image tensor in HWC format (height, width, channel).
/// Values are normalized to [0, 1]; standard layout makes the flat order
/// R, G, B per pixel, row by row.
pub type ImageTensor = Array3<f64>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Largest 8-bit channel value, used to normalize samples.
pub const CHANNEL_MAX: f64 = 255.0;
