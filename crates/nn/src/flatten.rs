//! Batch-preserving flatten.

use candle_core::{Error, Result, Tensor};

/// Flattens every dimension after the batch dimension into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flatten;

impl Flatten {
    /// Creates a flatten unit.
    pub fn new() -> Self {
        Self
    }

    /// Reshapes `(batch, d1, d2, ..)` to `(batch, d1 * d2 * ..)`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        if xs.dims().is_empty() {
            return Err(Error::Msg("flatten: input must have a batch dim".into()));
        }
        xs.flatten_from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn collapses_trailing_dims() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (2, 3, 4, 5), &device)?;
        let out = Flatten::new().forward(&input)?;
        assert_eq!(out.dims(), &[2, 60]);
        Ok(())
    }
}
