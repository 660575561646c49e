//! Rectifying activation.

use candle_core::{Result, Tensor};

/// ReLU unit.
///
/// The `inplace` flag is kept for introspection parity with frameworks that
/// support in-place execution; candle kernels always allocate, so the flag
/// does not change the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relu {
    inplace: bool,
}

impl Relu {
    /// Creates a ReLU unit.
    pub fn new(inplace: bool) -> Self {
        Self { inplace }
    }

    /// Whether the unit was requested to run in place.
    pub fn inplace(&self) -> bool {
        self.inplace
    }

    /// Zeroes out negative values.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.relu()
    }
}

impl Default for Relu {
    fn default() -> Self {
        Self { inplace: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn clamps_negatives() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::from_slice(&[-2f32, -0.5, 0.0, 1.5], 4, &device)?;
        let out = Relu::default().forward(&input)?;
        assert_eq!(out.to_vec1::<f32>()?, vec![0.0, 0.0, 0.0, 1.5]);
        Ok(())
    }
}
