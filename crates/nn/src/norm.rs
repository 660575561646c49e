//! Batch normalisation over the channel dimension.
//!
//! Inputs follow the `(batch, channels, spatial..)` convention with `rank`
//! spatial dimensions (rank 1 also accepts plain `(batch, channels)`).
//! Statistics are computed in `f32` over every non-channel dimension. In
//! training mode the batch statistics normalise the input and, when
//! tracking is enabled, fold into the running estimates; in evaluation mode
//! the running estimates are used instead.

use std::sync::Mutex;

use candle_core::{Device, DType, Error, Result, Tensor};

use crate::checks;

/// Configuration for a batch-normalisation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchNormConfig {
    /// Number of channels being normalised.
    pub num_features: usize,
    /// Spatial rank of the expected input (1, 2 or 3).
    pub rank: usize,
    /// Numeric stabiliser added to the variance.
    pub eps: f64,
    /// Weight of the batch statistics in the running estimates.
    pub momentum: f64,
    /// Whether learnable scale and shift parameters are applied.
    pub affine: bool,
    /// Whether running statistics are maintained for evaluation.
    pub track_running_stats: bool,
}

impl BatchNormConfig {
    /// Creates a configuration with the usual defaults.
    pub fn new(num_features: usize, rank: usize) -> Self {
        Self {
            num_features,
            rank,
            eps: 1e-5,
            momentum: 0.1,
            affine: true,
            track_running_stats: true,
        }
    }
}

/// Batch-normalisation unit.
///
/// Running statistics live behind a `Mutex` so an immutable unit can fold
/// batch statistics into them during training-mode forward passes.
#[derive(Debug)]
pub struct BatchNorm {
    config: BatchNormConfig,
    weight: Option<Tensor>,
    bias: Option<Tensor>,
    running: Option<Mutex<(Tensor, Tensor)>>,
}

impl BatchNorm {
    /// Builds a batch-normalisation unit on `device`.
    pub fn new(config: BatchNormConfig, device: &Device) -> Result<Self> {
        checks::expect_spatial_rank("batch_norm", config.rank)?;
        checks::expect_nonzero("batch_norm", "num_features", config.num_features)?;
        if config.eps <= 0.0 {
            return Err(Error::Msg(format!(
                "batch_norm: eps must be positive, got {}",
                config.eps
            )));
        }
        let (weight, bias) = if config.affine {
            (
                Some(Tensor::ones(config.num_features, DType::F32, device)?),
                Some(Tensor::zeros(config.num_features, DType::F32, device)?),
            )
        } else {
            (None, None)
        };
        let running = if config.track_running_stats {
            Some(Mutex::new((
                Tensor::zeros(config.num_features, DType::F32, device)?,
                Tensor::ones(config.num_features, DType::F32, device)?,
            )))
        } else {
            None
        };
        Ok(Self {
            config,
            weight,
            bias,
            running,
        })
    }

    /// Returns the static configuration.
    pub fn config(&self) -> &BatchNormConfig {
        &self.config
    }

    /// Returns the current running `(mean, variance)` estimates, if tracked.
    pub fn running_stats(&self) -> Option<(Tensor, Tensor)> {
        self.running.as_ref().map(|stats| {
            let guard = stats.lock().unwrap();
            (guard.0.clone(), guard.1.clone())
        })
    }

    /// Applies the normalisation.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let cfg = &self.config;
        let dims = xs.dims().len();
        if dims != cfg.rank + 2 && !(cfg.rank == 1 && dims == 2) {
            return Err(Error::Msg(format!(
                "batch_norm.input: expected a {}-d (or 2-d) input, got shape {:?}",
                cfg.rank + 2,
                xs.dims()
            )));
        }
        checks::expect_channels("batch_norm.input", xs, cfg.num_features)?;

        let (mean, var) = match (&self.running, train) {
            // eval with tracked statistics
            (Some(stats), false) => {
                let guard = stats.lock().unwrap();
                (guard.0.clone(), guard.1.clone())
            }
            (running, _) => {
                let (mean, var, count) = batch_stats(xs)?;
                if train {
                    if count < 2 {
                        return Err(Error::Msg(
                            "batch_norm: training needs more than one value per channel".into(),
                        ));
                    }
                    if let Some(stats) = running {
                        let unbiased = var.affine(count as f64 / (count as f64 - 1.0), 0.0)?;
                        let mut guard = stats.lock().unwrap();
                        guard.0 = ((guard.0.affine(1.0 - cfg.momentum, 0.0)?)
                            + mean.affine(cfg.momentum, 0.0)?)?;
                        guard.1 = ((guard.1.affine(1.0 - cfg.momentum, 0.0)?)
                            + unbiased.affine(cfg.momentum, 0.0)?)?;
                    }
                }
                (mean, var)
            }
        };

        let mut shape = vec![1usize; xs.dims().len()];
        shape[1] = cfg.num_features;
        let mean = mean.reshape(shape.clone())?;
        let denom = var.affine(1.0, cfg.eps)?.sqrt()?.reshape(shape.clone())?;
        let mut out = xs
            .to_dtype(DType::F32)?
            .broadcast_sub(&mean)?
            .broadcast_div(&denom)?;
        if let Some(weight) = &self.weight {
            out = out.broadcast_mul(&weight.reshape(shape.clone())?)?;
        }
        if let Some(bias) = &self.bias {
            out = out.broadcast_add(&bias.reshape(shape)?)?;
        }
        out.to_dtype(xs.dtype())
    }
}

/// Per-channel mean and biased variance over every non-channel dimension,
/// plus the number of values that contributed to each channel.
fn batch_stats(xs: &Tensor) -> Result<(Tensor, Tensor, usize)> {
    let flat = xs
        .to_dtype(DType::F32)?
        .transpose(0, 1)?
        .flatten_from(1)?;
    let count = flat.dims()[1];
    let mean = flat.mean(1)?;
    let centered = flat.broadcast_sub(&mean.unsqueeze(1)?)?;
    let var = centered.sqr()?.mean(1)?;
    Ok((mean, var, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn training_output_is_standardised() -> Result<()> {
        let device = Device::Cpu;
        let mut cfg = BatchNormConfig::new(3, 2);
        cfg.affine = false;
        let bn = BatchNorm::new(cfg, &device)?;
        let input = Tensor::randn(2f32, 4.0, (4, 3, 5, 5), &device)?;
        let out = bn.forward_t(&input, true)?;

        let (mean, var, _) = batch_stats(&out)?;
        let worst_mean = mean.abs()?.max_all()?.to_vec0::<f32>()?;
        let worst_var = var.affine(1.0, -1.0)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(worst_mean < 1e-4, "mean {worst_mean}");
        assert!(worst_var < 1e-2, "var {worst_var}");
        Ok(())
    }

    #[test]
    fn eval_uses_running_stats() -> Result<()> {
        let device = Device::Cpu;
        let bn = BatchNorm::new(BatchNormConfig::new(2, 1), &device)?;
        // Fresh running stats are (0, 1), so eval mode is the identity up to
        // the eps term.
        let input = Tensor::from_slice(&[1f32, -1., 2., -2.], (2, 2), &device)?;
        let out = bn.forward_t(&input, false)?;
        let diff = out.sub(&input)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(diff < 1e-4);
        Ok(())
    }

    #[test]
    fn training_updates_running_stats() -> Result<()> {
        let device = Device::Cpu;
        let bn = BatchNorm::new(BatchNormConfig::new(2, 1), &device)?;
        let input = Tensor::from_slice(&[10f32, 0., 10., 0.], (2, 2), &device)?;
        bn.forward_t(&input, true)?;
        let (mean, _) = bn.running_stats().unwrap();
        // momentum 0.1 folds one tenth of the batch mean (10, 0) in
        let mean = mean.to_vec1::<f32>()?;
        assert!((mean[0] - 1.0).abs() < 1e-5);
        assert!(mean[1].abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn rejects_single_sample_training() -> Result<()> {
        let device = Device::Cpu;
        let bn = BatchNorm::new(BatchNormConfig::new(3, 1), &device)?;
        let input = Tensor::randn(0f32, 1.0, (1, 3), &device)?;
        assert!(bn.forward_t(&input, true).is_err());
        Ok(())
    }
}
