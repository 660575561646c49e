//! Layers and the flattener that turns them into one unit sequence.
//!
//! A [`Layer`] is the universal currency between composition stages: either
//! a single constructed unit, or a stream that lazily produces units (and
//! possibly an error partway through). Flattening expands streams in place
//! while passing single units straight through, preserving order with no
//! buffering.

use std::fmt;

use wick_nn::Unit;

use crate::error::Result;

/// A lazily-produced unit sequence; consumed exactly once.
pub type UnitStream = Box<dyn Iterator<Item = Result<Unit>>>;

/// One constructed unit, or a stream of them.
pub enum Layer {
    /// A single unit, passed through flattening unchanged.
    Unit(Unit),
    /// A produce-as-you-go unit sequence, expanded in place.
    Stream(UnitStream),
}

impl Layer {
    /// Wraps an already-built unit collection as a layer.
    pub fn from_units<I>(units: I) -> Self
    where
        I: IntoIterator<Item = Unit>,
        I::IntoIter: 'static,
    {
        Layer::Stream(Box::new(units.into_iter().map(Ok)))
    }

    /// Wraps a fallible unit stream as a layer.
    pub fn from_stream<I>(stream: I) -> Self
    where
        I: Iterator<Item = Result<Unit>> + 'static,
    {
        Layer::Stream(Box::new(stream))
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Unit(unit) => write!(f, "Layer::Unit({unit})"),
            Layer::Stream(_) => write!(f, "Layer::Stream(..)"),
        }
    }
}

impl From<Unit> for Layer {
    fn from(unit: Unit) -> Self {
        Layer::Unit(unit)
    }
}

impl From<Vec<Unit>> for Layer {
    fn from(units: Vec<Unit>) -> Self {
        Layer::from_units(units)
    }
}

/// Flattens a mix of single units and streams into one lazy unit sequence.
///
/// Relative order is preserved: each stream is drained in place before the
/// next layer is touched. The sequence fuses after the first error — units
/// yielded before it remain valid, nothing after it is produced.
pub fn units_from_layers<I>(layers: I) -> Flattened<I::IntoIter>
where
    I: IntoIterator<Item = Layer>,
{
    Flattened {
        layers: layers.into_iter(),
        current: None,
        failed: false,
    }
}

/// Iterator returned by [`units_from_layers`].
pub struct Flattened<I> {
    layers: I,
    current: Option<UnitStream>,
    failed: bool,
}

impl<I: Iterator<Item = Layer>> Iterator for Flattened<I> {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(stream) = &mut self.current {
                match stream.next() {
                    Some(Ok(unit)) => return Some(Ok(unit)),
                    Some(Err(err)) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }
            match self.layers.next()? {
                Layer::Unit(unit) => return Some(Ok(unit)),
                Layer::Stream(stream) => self.current = Some(stream),
            }
        }
    }
}
