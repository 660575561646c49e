//! Max and average pooling of spatial rank 1, 2 and 3.
//!
//! Candle ships 2-d pooling kernels only, so rank 1 runs as a `(1, k)` 2-d
//! pool and rank 3 reduces depth windows of 2-d pooled slices. Max pooling
//! pads with `-inf` so the border never wins a window; average pooling pads
//! with zeros, which counts padded positions like the usual
//! `count_include_pad` behaviour.

use candle_core::{Error, Result, Tensor};

use crate::checks;

/// Which reduction a pooling unit applies to each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Keep the maximum of the window.
    Max,
    /// Keep the mean of the window.
    Average,
}

/// Configuration shared by both pooling reductions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of spatial dimensions (1, 2 or 3).
    pub rank: usize,
    /// Window extent along every spatial dimension.
    pub kernel_size: usize,
    /// Step between windows; defaults to the window extent.
    pub stride: usize,
    /// Implicit padding on both sides of every spatial dimension.
    pub padding: usize,
}

impl PoolConfig {
    /// Creates a configuration with stride equal to the window extent.
    pub fn new(rank: usize, kernel_size: usize) -> Self {
        Self {
            rank,
            kernel_size,
            stride: kernel_size,
            padding: 0,
        }
    }
}

/// Pooling unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    kind: PoolKind,
    config: PoolConfig,
}

impl Pool {
    /// Creates a pooling unit.
    pub fn new(kind: PoolKind, config: PoolConfig) -> Result<Self> {
        checks::expect_spatial_rank("pool", config.rank)?;
        checks::expect_nonzero("pool", "kernel_size", config.kernel_size)?;
        checks::expect_nonzero("pool", "stride", config.stride)?;
        if config.padding > config.kernel_size / 2 {
            return Err(Error::Msg(format!(
                "pool: padding {} must be at most half the window {}",
                config.padding, config.kernel_size
            )));
        }
        Ok(Self { kind, config })
    }

    /// Returns the reduction kind.
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Returns the static configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Applies the pooling reduction.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let cfg = &self.config;
        checks::expect_input_rank("pool.input", xs, cfg.rank + 2)?;
        let (k, s) = (cfg.kernel_size, cfg.stride);

        match cfg.rank {
            1 => {
                let xs = self.pad(xs, &[2])?.unsqueeze(2)?;
                let out = self.pool_2d(&xs, (1, k), (1, s))?;
                out.squeeze(2)
            }
            2 => {
                let xs = self.pad(xs, &[2, 3])?;
                self.pool_2d(&xs, (k, k), (s, s))
            }
            _ => {
                let xs = self.pad(xs, &[2, 3, 4])?;
                self.pool_3d(&xs)
            }
        }
    }

    fn pool_2d(&self, xs: &Tensor, sz: (usize, usize), stride: (usize, usize)) -> Result<Tensor> {
        match self.kind {
            PoolKind::Max => xs.max_pool2d_with_stride(sz, stride),
            PoolKind::Average => xs.avg_pool2d_with_stride(sz, stride),
        }
    }

    /// Depth windows reduce over 2-d pooled slices; max and mean both
    /// factor through per-axis reductions.
    fn pool_3d(&self, xs: &Tensor) -> Result<Tensor> {
        let (k, s) = (self.config.kernel_size, self.config.stride);
        let depth = xs.dims()[2];
        if depth < k {
            return Err(Error::Msg(format!(
                "pool.input: depth {depth} is smaller than the window {k}"
            )));
        }
        let out_depth = (depth - k) / s + 1;

        let mut slices = Vec::with_capacity(out_depth);
        for od in 0..out_depth {
            let mut acc: Option<Tensor> = None;
            for kd in 0..k {
                let plane = xs.narrow(2, od * s + kd, 1)?.squeeze(2)?;
                let pooled = self.pool_2d(&plane, (k, k), (s, s))?;
                acc = Some(match acc {
                    Some(prev) => match self.kind {
                        PoolKind::Max => prev.maximum(&pooled)?,
                        PoolKind::Average => (prev + pooled)?,
                    },
                    None => pooled,
                });
            }
            let acc = acc.ok_or_else(|| Error::Msg("pool: empty window".into()))?;
            let acc = match self.kind {
                PoolKind::Max => acc,
                PoolKind::Average => acc.affine(1.0 / k as f64, 0.0)?,
            };
            slices.push(acc.unsqueeze(2)?);
        }
        Tensor::cat(&slices, 2)
    }

    /// Materialises the padded border on the listed dims.
    fn pad(&self, xs: &Tensor, dims: &[usize]) -> Result<Tensor> {
        let p = self.config.padding;
        if p == 0 {
            return Ok(xs.clone());
        }
        let mut out = xs.clone();
        for &dim in dims {
            out = match self.kind {
                PoolKind::Average => out.pad_with_zeros(dim, p, p)?,
                PoolKind::Max => {
                    let mut border_dims = out.dims().to_vec();
                    border_dims[dim] = p;
                    let border =
                        Tensor::full(f32::NEG_INFINITY, border_dims, out.device())?
                            .to_dtype(out.dtype())?;
                    Tensor::cat(&[&border, &out, &border], dim)?
                }
            };
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn max_pool2_picks_window_maxima() -> Result<()> {
        let device = Device::Cpu;
        let pool = Pool::new(PoolKind::Max, PoolConfig::new(2, 2))?;
        let input = Tensor::from_slice(
            &[1f32, 2., 3., 4., 5., 6., 7., 8., 9., 10., 11., 12., 13., 14., 15., 16.],
            (1, 1, 4, 4),
            &device,
        )?;
        let out = pool.forward(&input)?;
        assert_eq!(out.dims(), &[1, 1, 2, 2]);
        assert_eq!(
            out.flatten_all()?.to_vec1::<f32>()?,
            vec![6., 8., 14., 16.]
        );
        Ok(())
    }

    #[test]
    fn avg_pool1_means_windows() -> Result<()> {
        let device = Device::Cpu;
        let pool = Pool::new(PoolKind::Average, PoolConfig::new(1, 2))?;
        let input = Tensor::from_slice(&[1f32, 3., 5., 7.], (1, 1, 4), &device)?;
        let out = pool.forward(&input)?;
        assert_eq!(out.dims(), &[1, 1, 2]);
        assert_eq!(out.flatten_all()?.to_vec1::<f32>()?, vec![2., 6.]);
        Ok(())
    }

    #[test]
    fn max_pool3_reduces_depth() -> Result<()> {
        let device = Device::Cpu;
        let pool = Pool::new(PoolKind::Max, PoolConfig::new(3, 2))?;
        let input = Tensor::randn(0f32, 1.0, (1, 2, 4, 4, 4), &device)?;
        let out = pool.forward(&input)?;
        assert_eq!(out.dims(), &[1, 2, 2, 2, 2]);
        Ok(())
    }

    #[test]
    fn max_padding_never_wins() -> Result<()> {
        let device = Device::Cpu;
        let mut cfg = PoolConfig::new(2, 3);
        cfg.stride = 3;
        cfg.padding = 1;
        let pool = Pool::new(PoolKind::Max, cfg)?;
        let input = Tensor::full(-5f32, (1, 1, 4, 4), &device)?;
        let out = pool.forward(&input)?;
        // every window still reports a real value, not the border fill
        assert_eq!(
            out.flatten_all()?.to_vec1::<f32>()?,
            vec![-5., -5., -5., -5.]
        );
        Ok(())
    }
}
