//! Packaging flattened layers into one executable unit.

use wick_nn::{Stack, Unit};

use crate::error::Result;
use crate::flatten::{units_from_layers, Layer};

/// Flattens `layers` and returns one executable unit.
///
/// A single resulting unit is returned as-is; anything else becomes a
/// [`Stack`] executing the units in order. Errors from lazy layers
/// propagate unchanged.
pub fn unit_from_layers<I>(layers: I) -> Result<Unit>
where
    I: IntoIterator<Item = Layer>,
{
    build(layers, false)
}

/// [`unit_from_layers`], with every unit wrapped in a logging decorator
/// that reports its label and input shape on each forward call.
pub fn unit_from_layers_traced<I>(layers: I) -> Result<Unit>
where
    I: IntoIterator<Item = Layer>,
{
    build(layers, true)
}

fn build<I>(layers: I, traced: bool) -> Result<Unit>
where
    I: IntoIterator<Item = Layer>,
{
    let mut units = Vec::new();
    for unit in units_from_layers(layers) {
        let unit = unit?;
        units.push(if traced { unit.traced() } else { unit });
    }
    log::debug!("assembled {} unit(s)", units.len());
    if units.len() == 1 {
        Ok(units.remove(0))
    } else {
        Ok(Unit::from(Stack::new(units)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use wick_nn::{Linear, LinearConfig, Relu};

    fn linear() -> Unit {
        Unit::from(Linear::new(LinearConfig::new(2, 2), &Device::Cpu).expect("linear"))
    }

    #[test]
    fn single_unit_is_returned_unwrapped() -> Result<()> {
        let unit = unit_from_layers(vec![Layer::from(linear())])?;
        assert!(matches!(unit, Unit::Linear(_)));
        Ok(())
    }

    #[test]
    fn multiple_units_become_a_stack() -> Result<()> {
        let unit = unit_from_layers(vec![
            Layer::from(linear()),
            Layer::from(Unit::from(Relu::default())),
        ])?;
        match unit {
            Unit::Stack(stack) => assert_eq!(stack.len(), 2),
            other => panic!("expected a stack, got {other}"),
        }
        Ok(())
    }

    #[test]
    fn tracing_wraps_every_unit() -> Result<()> {
        let unit = unit_from_layers_traced(vec![
            Layer::from(linear()),
            Layer::from(Unit::from(Relu::default())),
        ])?;
        match unit {
            Unit::Stack(stack) => {
                assert!(stack
                    .units()
                    .iter()
                    .all(|unit| matches!(unit, Unit::Traced(_))));
            }
            other => panic!("expected a stack, got {other}"),
        }
        Ok(())
    }

    #[test]
    fn no_units_make_an_empty_stack() -> Result<()> {
        let unit = unit_from_layers(Vec::new())?;
        match unit {
            Unit::Stack(stack) => assert!(stack.is_empty()),
            other => panic!("expected a stack, got {other}"),
        }
        Ok(())
    }
}
