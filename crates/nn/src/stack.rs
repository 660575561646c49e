//! Ordered composite execution.

use candle_core::{Result, Tensor};

use crate::unit::Unit;

/// Executes a sequence of units, each consuming the previous output.
///
/// An empty stack is the identity.
#[derive(Debug, Default)]
pub struct Stack {
    units: Vec<Unit>,
}

impl Stack {
    /// Creates a stack from an ordered unit list.
    pub fn new(units: Vec<Unit>) -> Self {
        Self { units }
    }

    /// Returns the contained units in execution order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Number of contained units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the stack contains no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Runs every unit in order.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut hidden = xs.clone();
        for unit in &self.units {
            hidden = unit.forward_t(&hidden, train)?;
        }
        Ok(hidden)
    }
}

impl FromIterator<Unit> for Stack {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Relu;
    use crate::linear::{Linear, LinearConfig};
    use candle_core::{Device, Tensor};

    #[test]
    fn chains_units_in_order() -> Result<()> {
        let device = Device::Cpu;
        let stack = Stack::new(vec![
            Unit::from(Linear::new(LinearConfig::new(4, 8), &device)?),
            Unit::from(Relu::default()),
            Unit::from(Linear::new(LinearConfig::new(8, 2), &device)?),
        ]);
        let input = Tensor::randn(0f32, 1.0, (3, 4), &device)?;
        let out = stack.forward_t(&input, false)?;
        assert_eq!(out.dims(), &[3, 2]);
        Ok(())
    }

    #[test]
    fn empty_stack_is_identity() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (2, 2), &device)?;
        let out = Stack::default().forward_t(&input, true)?;
        let diff = out.sub(&input)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }
}
