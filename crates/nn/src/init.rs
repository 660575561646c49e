//! Default parameter initialisation.
//!
//! Freshly constructed units sample their weights from the Kaiming-style
//! uniform distribution `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, the common
//! default for affine and convolutional layers. Biases use the same bound.

use candle_core::{Device, Result, Shape, Tensor};

/// Samples a weight tensor for the given `fan_in`.
pub(crate) fn kaiming_uniform<S: Into<Shape>>(
    shape: S,
    fan_in: usize,
    device: &Device,
) -> Result<Tensor> {
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    Tensor::rand(-bound as f32, bound as f32, shape, device)
}
