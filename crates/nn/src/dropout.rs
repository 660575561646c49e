//! Train-gated dropout.

use candle_core::{Error, Result, Tensor};

/// Dropout unit: zeroes elements with probability `p` during training and
/// rescales the survivors; the identity in evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    p: f64,
}

impl Dropout {
    /// Creates a dropout unit. `p` must lie in `[0, 1)`.
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::Msg(format!(
                "dropout: probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Self { p })
    }

    /// Returns the drop probability.
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Applies dropout when `train` is set, otherwise passes through.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        if train && self.p > 0.0 {
            candle_nn::ops::dropout(xs, self.p as f32)
        } else {
            Ok(xs.clone())
        }
    }
}

impl Default for Dropout {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn identity_in_eval_mode() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (2, 8), &device)?;
        let out = Dropout::new(0.9)?.forward_t(&input, false)?;
        let diff = out.sub(&input)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn zero_probability_is_identity_in_train_mode() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (2, 8), &device)?;
        let out = Dropout::new(0.0)?.forward_t(&input, true)?;
        let diff = out.sub(&input)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn rejects_certain_drop() {
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(-0.1).is_err());
    }
}
