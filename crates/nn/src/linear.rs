//! Dense affine projections.
//!
//! Linear units accept inputs shaped `(.., in_features)` with any number of
//! leading dimensions and return tensors with the same leading layout and
//! `out_features` as the last dimension. Leading dimensions are flattened for
//! the matmul and restored afterwards.

use candle_core::{Device, Error, Result, Tensor};

use crate::{checks, init};

/// Configuration for a dense affine projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub in_features: usize,
    /// Outgoing feature dimension.
    pub out_features: usize,
    /// Whether a learnable bias vector is applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration with bias enabled.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            bias: true,
        }
    }
}

/// Dense affine projection with freshly initialised parameters.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    /// Builds a linear unit with default-initialised weights on `device`.
    pub fn new(config: LinearConfig, device: &Device) -> Result<Self> {
        checks::expect_nonzero("linear", "in_features", config.in_features)?;
        checks::expect_nonzero("linear", "out_features", config.out_features)?;
        let weight = init::kaiming_uniform(
            (config.out_features, config.in_features),
            config.in_features,
            device,
        )?;
        let bias = if config.bias {
            Some(init::kaiming_uniform(
                config.out_features,
                config.in_features,
                device,
            )?)
        } else {
            None
        };
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Constructs a linear unit from pre-existing parameters.
    pub fn from_parameters(
        config: LinearConfig,
        weight: Tensor,
        bias: Option<Tensor>,
    ) -> Result<Self> {
        if weight.dims() != [config.out_features, config.in_features] {
            return Err(Error::Msg(format!(
                "linear.weight: expected shape [{}, {}], got {:?}",
                config.out_features,
                config.in_features,
                weight.dims()
            )));
        }
        match (config.bias, &bias) {
            (true, Some(tensor)) if tensor.dims() != [config.out_features] => {
                return Err(Error::Msg(format!(
                    "linear.bias: expected shape [{}], got {:?}",
                    config.out_features,
                    tensor.dims()
                )));
            }
            (true, None) => return Err(Error::Msg("config expects bias but none supplied".into())),
            (false, Some(_)) => {
                return Err(Error::Msg("bias provided but config disables bias".into()))
            }
            _ => {}
        }
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Returns the static configuration.
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Returns the weight tensor.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Returns the bias tensor if present.
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    /// Applies the projection.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let dims = xs.dims();
        let last = match dims.last() {
            Some(&last) if last == self.config.in_features => last,
            _ => {
                return Err(Error::Msg(format!(
                    "linear.input: expected last dim {}, got shape {:?}",
                    self.config.in_features, dims
                )))
            }
        };
        let rows: usize = dims[..dims.len() - 1].iter().product();
        let flat = xs.reshape((rows, last))?;
        let mut out = flat.matmul(&self.weight.t()?)?;
        if let Some(bias) = &self.bias {
            out = out.broadcast_add(bias)?;
        }
        let mut out_dims = dims[..dims.len() - 1].to_vec();
        out_dims.push(self.config.out_features);
        out.reshape(out_dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn forward_matches_reference() -> Result<()> {
        let device = Device::Cpu;
        let config = LinearConfig::new(3, 2);
        let weight = Tensor::from_slice(&[1f32, 0., 0., 0., 1., 0.], (2, 3), &device)?;
        let bias = Tensor::from_slice(&[0.5f32, -0.5], 2, &device)?;
        let linear = Linear::from_parameters(config, weight, Some(bias))?;

        let input = Tensor::from_slice(&[1f32, 2., 3., 4., 5., 6.], (2, 3), &device)?;
        let out = linear.forward(&input)?;

        assert_eq!(out.dims(), &[2, 2]);
        assert_eq!(out.to_vec2::<f32>()?, vec![vec![1.5, 1.5], vec![4.5, 4.5]]);
        Ok(())
    }

    #[test]
    fn forward_preserves_leading_dims() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::new(LinearConfig::new(4, 8), &device)?;
        let input = Tensor::randn(0f32, 1.0, (2, 5, 4), &device)?;
        let out = linear.forward(&input)?;
        assert_eq!(out.dims(), &[2, 5, 8]);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_input() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::new(LinearConfig::new(4, 8), &device)?;
        let input = Tensor::randn(0f32, 1.0, (2, 3), &device)?;
        assert!(linear.forward(&input).is_err());
        Ok(())
    }
}
