//! Convolutions of spatial rank 1, 2 and 3.
//!
//! One unit covers all three ranks with square/cubic kernel geometry and
//! scalar stride, padding and dilation, matching candle's own convolution
//! convention. Rank 1 and 2 map directly onto `Tensor::conv1d`/`conv2d`;
//! rank 3 is lowered onto a sum of `conv2d` calls over depth slices of the
//! kernel, which computes the exact 3-d convolution without a dedicated
//! kernel.
//!
//! Inputs are `(batch, channels, spatial..)` with `rank` spatial dimensions.

use candle_core::{Device, Error, Result, Tensor};

use crate::{checks, init};

/// How out-of-range positions are filled before convolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// Zero fill.
    #[default]
    Zeros,
    /// Repeat the edge value.
    Replicate,
}

/// Configuration shared by all convolution ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvConfig {
    /// Number of spatial dimensions (1, 2 or 3).
    pub rank: usize,
    /// Incoming channel count.
    pub in_channels: usize,
    /// Outgoing channel count.
    pub out_channels: usize,
    /// Kernel extent along every spatial dimension.
    pub kernel_size: usize,
    /// Step between kernel applications.
    pub stride: usize,
    /// Implicit padding on both sides of every spatial dimension.
    pub padding: usize,
    /// Spacing between kernel taps.
    pub dilation: usize,
    /// Number of blocked channel groups.
    pub groups: usize,
    /// Fill rule for the padded border.
    pub padding_mode: PaddingMode,
    /// Whether a learnable bias is added per output channel.
    pub bias: bool,
}

impl ConvConfig {
    /// Creates a configuration with the usual defaults (stride 1, no
    /// padding, dilation 1, one group, zero fill, bias enabled).
    pub fn new(rank: usize, in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self {
            rank,
            in_channels,
            out_channels,
            kernel_size,
            stride: 1,
            padding: 0,
            dilation: 1,
            groups: 1,
            padding_mode: PaddingMode::Zeros,
            bias: true,
        }
    }
}

/// Convolution unit with freshly initialised parameters.
#[derive(Debug, Clone)]
pub struct Conv {
    config: ConvConfig,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Conv {
    /// Builds a convolution with default-initialised weights on `device`.
    pub fn new(config: ConvConfig, device: &Device) -> Result<Self> {
        checks::expect_spatial_rank("conv", config.rank)?;
        checks::expect_nonzero("conv", "in_channels", config.in_channels)?;
        checks::expect_nonzero("conv", "out_channels", config.out_channels)?;
        checks::expect_nonzero("conv", "kernel_size", config.kernel_size)?;
        checks::expect_nonzero("conv", "stride", config.stride)?;
        checks::expect_nonzero("conv", "dilation", config.dilation)?;
        checks::expect_nonzero("conv", "groups", config.groups)?;
        if config.in_channels % config.groups != 0 || config.out_channels % config.groups != 0 {
            return Err(Error::Msg(format!(
                "conv: in_channels {} and out_channels {} must be divisible by groups {}",
                config.in_channels, config.out_channels, config.groups
            )));
        }

        let per_group = config.in_channels / config.groups;
        let mut shape = vec![config.out_channels, per_group];
        shape.extend(std::iter::repeat(config.kernel_size).take(config.rank));
        let fan_in = per_group * config.kernel_size.pow(config.rank as u32);
        let weight = init::kaiming_uniform(shape, fan_in, device)?;
        let bias = if config.bias {
            Some(init::kaiming_uniform(config.out_channels, fan_in, device)?)
        } else {
            None
        };
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Returns the static configuration.
    pub fn config(&self) -> &ConvConfig {
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

    /// Applies the convolution.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let cfg = &self.config;
        checks::expect_input_rank("conv.input", xs, cfg.rank + 2)?;
        checks::expect_channels("conv.input", xs, cfg.in_channels)?;

        // Replicate padding has no fused path in candle, so the border is
        // materialised up front and the op itself runs unpadded.
        let (xs, padding) = match (cfg.padding_mode, cfg.padding) {
            (PaddingMode::Zeros, p) => (xs.clone(), p),
            (PaddingMode::Replicate, 0) => (xs.clone(), 0),
            (PaddingMode::Replicate, p) => {
                let mut padded = xs.clone();
                for dim in 2..2 + cfg.rank {
                    padded = padded.pad_with_same(dim, p, p)?;
                }
                (padded, 0)
            }
        };

        let mut out = match cfg.rank {
            1 => xs.conv1d(&self.weight, padding, cfg.stride, cfg.dilation, cfg.groups)?,
            2 => xs.conv2d(&self.weight, padding, cfg.stride, cfg.dilation, cfg.groups)?,
            _ => self.forward_3d(&xs, padding)?,
        };

        if let Some(bias) = &self.bias {
            let mut shape = vec![1usize; cfg.rank + 2];
            shape[1] = cfg.out_channels;
            out = out.broadcast_add(&bias.reshape(shape)?)?;
        }
        Ok(out)
    }

    /// 3-d convolution lowered onto `conv2d`: for every output depth index,
    /// the depth taps of the kernel each convolve one input slice and the
    /// partial results are summed.
    fn forward_3d(&self, xs: &Tensor, padding: usize) -> Result<Tensor> {
        let cfg = &self.config;
        let xs = if padding > 0 {
            xs.pad_with_zeros(2, padding, padding)?
        } else {
            xs.clone()
        };
        let depth = xs.dims()[2];
        let span = cfg.dilation * (cfg.kernel_size - 1) + 1;
        if depth < span {
            return Err(Error::Msg(format!(
                "conv.input: depth {} is smaller than the kernel span {}",
                depth, span
            )));
        }
        let out_depth = (depth - span) / cfg.stride + 1;

        let mut slices = Vec::with_capacity(out_depth);
        for od in 0..out_depth {
            let mut acc: Option<Tensor> = None;
            for kd in 0..cfg.kernel_size {
                let plane = xs
                    .narrow(2, od * cfg.stride + kd * cfg.dilation, 1)?
                    .squeeze(2)?;
                let taps = self.weight.narrow(2, kd, 1)?.squeeze(2)?;
                let partial = plane.conv2d(&taps, padding, cfg.stride, cfg.dilation, cfg.groups)?;
                acc = Some(match acc {
                    Some(sum) => (sum + partial)?,
                    None => partial,
                });
            }
            // kernel_size is validated non-zero, so the accumulator is set
            let acc = acc.ok_or_else(|| Error::Msg("conv: empty kernel".into()))?;
            slices.push(acc.unsqueeze(2)?);
        }
        Tensor::cat(&slices, 2)
    }
}
