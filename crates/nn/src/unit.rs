//! The opaque module unit handed around by the composition layer.

use std::fmt;

use candle_core::{Result, Tensor};

use crate::{
    activation::Relu,
    conv::Conv,
    dropout::Dropout,
    flatten::Flatten,
    norm::BatchNorm,
    pool::{Pool, PoolKind},
    linear::Linear,
    stack::Stack,
};

/// One constructed computational primitive.
///
/// Composition code treats units as inert values: it orders them, stacks
/// them and hands them back to the caller, but never inspects their
/// numerics.
#[derive(Debug)]
pub enum Unit {
    /// Dense affine projection.
    Linear(Linear),
    /// Convolution of spatial rank 1–3.
    Conv(Conv),
    /// Rectifying activation.
    Relu(Relu),
    /// Batch normalisation.
    BatchNorm(BatchNorm),
    /// Train-gated dropout.
    Dropout(Dropout),
    /// Max or average pooling.
    Pool(Pool),
    /// Batch-preserving flatten.
    Flatten(Flatten),
    /// Ordered composite of further units.
    Stack(Stack),
    /// Logging decorator around another unit.
    Traced(Box<Traced>),
}

impl Unit {
    /// Runs the unit with an explicit training flag.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Unit::Linear(linear) => linear.forward(xs),
            Unit::Conv(conv) => conv.forward(xs),
            Unit::Relu(relu) => relu.forward(xs),
            Unit::BatchNorm(norm) => norm.forward_t(xs, train),
            Unit::Dropout(dropout) => dropout.forward_t(xs, train),
            Unit::Pool(pool) => pool.forward(xs),
            Unit::Flatten(flatten) => flatten.forward(xs),
            Unit::Stack(stack) => stack.forward_t(xs, train),
            Unit::Traced(traced) => traced.forward_t(xs, train),
        }
    }

    /// Runs the unit in evaluation mode.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, false)
    }

    /// Wraps the unit in a [`Traced`] decorator.
    pub fn traced(self) -> Unit {
        Unit::Traced(Box::new(Traced::new(self)))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Linear(linear) => {
                let cfg = linear.config();
                write!(
                    f,
                    "Linear(in={}, out={}, bias={})",
                    cfg.in_features, cfg.out_features, cfg.bias
                )
            }
            Unit::Conv(conv) => {
                let cfg = conv.config();
                write!(
                    f,
                    "Conv{}(in={}, out={}, kernel={}, bias={})",
                    cfg.rank, cfg.in_channels, cfg.out_channels, cfg.kernel_size, cfg.bias
                )
            }
            Unit::Relu(_) => write!(f, "ReLU"),
            Unit::BatchNorm(norm) => {
                let cfg = norm.config();
                write!(f, "BatchNorm{}(features={})", cfg.rank, cfg.num_features)
            }
            Unit::Dropout(dropout) => write!(f, "Dropout(p={})", dropout.p()),
            Unit::Pool(pool) => {
                let cfg = pool.config();
                let kind = match pool.kind() {
                    PoolKind::Max => "MaxPool",
                    PoolKind::Average => "AvgPool",
                };
                write!(f, "{}{}(size={}, stride={})", kind, cfg.rank, cfg.kernel_size, cfg.stride)
            }
            Unit::Flatten(_) => write!(f, "Flatten"),
            Unit::Stack(stack) => write!(f, "Stack(len={})", stack.len()),
            Unit::Traced(traced) => write!(f, "Traced({})", traced.label()),
        }
    }
}

impl From<Linear> for Unit {
    fn from(value: Linear) -> Self {
        Unit::Linear(value)
    }
}

impl From<Conv> for Unit {
    fn from(value: Conv) -> Self {
        Unit::Conv(value)
    }
}

impl From<Relu> for Unit {
    fn from(value: Relu) -> Self {
        Unit::Relu(value)
    }
}

impl From<BatchNorm> for Unit {
    fn from(value: BatchNorm) -> Self {
        Unit::BatchNorm(value)
    }
}

impl From<Dropout> for Unit {
    fn from(value: Dropout) -> Self {
        Unit::Dropout(value)
    }
}

impl From<Pool> for Unit {
    fn from(value: Pool) -> Self {
        Unit::Pool(value)
    }
}

impl From<Flatten> for Unit {
    fn from(value: Flatten) -> Self {
        Unit::Flatten(value)
    }
}

impl From<Stack> for Unit {
    fn from(value: Stack) -> Self {
        Unit::Stack(value)
    }
}

/// Pass-through decorator that logs the label and input shape of every
/// forward call at `debug` level before delegating.
#[derive(Debug)]
pub struct Traced {
    label: String,
    inner: Unit,
}

impl Traced {
    /// Wraps `inner`, capturing its description as the trace label.
    pub fn new(inner: Unit) -> Self {
        Self {
            label: inner.to_string(),
            inner,
        }
    }

    /// Returns the captured label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the wrapped unit.
    pub fn inner(&self) -> &Unit {
        &self.inner
    }

    /// Logs and delegates; the output is exactly the inner unit's output.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        log::debug!("{}: input shape {:?}", self.label, xs.dims());
        self.inner.forward_t(xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{Linear, LinearConfig};
    use candle_core::{Device, Tensor};

    #[test]
    fn display_names_the_primitive() -> Result<()> {
        let device = Device::Cpu;
        let unit = Unit::from(Linear::new(LinearConfig::new(1, 2), &device)?);
        assert_eq!(unit.to_string(), "Linear(in=1, out=2, bias=true)");
        Ok(())
    }

    #[test]
    fn traced_output_matches_inner() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::new(LinearConfig::new(4, 2), &device)?;
        let plain = Unit::from(linear.clone());
        let traced = Unit::from(linear).traced();

        let input = Tensor::randn(0f32, 1.0, (3, 4), &device)?;
        let a = plain.forward(&input)?;
        let b = traced.forward(&input)?;
        let diff = a.sub(&b)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }
}
