//! Repeated factory invocation over broadcast parameter rows.

use candle_core::Device;
use wick_nn::{Linear, LinearConfig, Unit};

use crate::args::KwArgs;
use crate::broadcast::{Params, Rows};
use crate::error::{Error, Result};
use crate::flatten::{Layer, UnitStream};

/// Anything that can turn one keyword-argument row into a layer.
///
/// Closures of type `Fn(KwArgs) -> Result<Layer>` implement this, as do
/// factories synthesized from the naming grammar.
pub trait LayerFactory {
    /// Builds the layer for one row of arguments.
    fn invoke(&self, kwargs: KwArgs) -> Result<Layer>;
}

impl<F> LayerFactory for F
where
    F: Fn(KwArgs) -> Result<Layer>,
{
    fn invoke(&self, kwargs: KwArgs) -> Result<Layer> {
        self(kwargs)
    }
}

/// Invokes `factory` once per broadcast row and flattens the results into
/// one lazy unit sequence, concatenating in row order.
///
/// The broadcast itself is validated eagerly; factory and stream errors
/// surface lazily during consumption, leaving earlier units valid.
pub fn make_layers<F>(factory: F, params: Params) -> Result<MakeLayers<F>>
where
    F: LayerFactory,
{
    Ok(MakeLayers {
        factory,
        rows: params.rows()?,
        current: None,
        failed: false,
    })
}

/// Iterator returned by [`make_layers`].
pub struct MakeLayers<F> {
    factory: F,
    rows: Rows,
    current: Option<UnitStream>,
    failed: bool,
}

impl<F: LayerFactory> Iterator for MakeLayers<F> {
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
            let kwargs = self.rows.next()?;
            match self.factory.invoke(kwargs) {
                Ok(Layer::Unit(unit)) => return Some(Ok(unit)),
                Ok(Layer::Stream(stream)) => self.current = Some(stream),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<F: LayerFactory + 'static> From<MakeLayers<F>> for Layer {
    fn from(layers: MakeLayers<F>) -> Self {
        Layer::Stream(Box::new(layers))
    }
}

/// Broadcast-invokes `factory` over every (in, out) pair except the last,
/// then appends one plain bias-enabled linear unit for the final pair.
///
/// The factory is bypassed for the last layer because trailing activation
/// or regularisation units are normally undesired after the final
/// projection. `extra` supplies additional broadcast parameters for the
/// factory-built pairs.
pub fn mlp_layers<F>(
    factory: F,
    in_channels: &[usize],
    out_channels: &[usize],
    extra: Params,
    device: &Device,
) -> Result<Layer>
where
    F: LayerFactory + 'static,
{
    let (&last_in, head_in) = in_channels.split_last().ok_or(Error::EmptyMlp)?;
    let (&last_out, head_out) = out_channels.split_last().ok_or(Error::EmptyMlp)?;

    let params = Params::new()
        .seq("in_channels", head_in.iter().copied())
        .seq("out_channels", head_out.iter().copied())
        .merge(extra);
    let head = make_layers(factory, params)?;

    let last = Unit::from(Linear::new(LinearConfig::new(last_in, last_out), device)?);
    Ok(Layer::from_stream(head.chain(std::iter::once(Ok(last)))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use wick_nn::Relu;

    #[test]
    fn concatenates_rows_in_order() -> Result<()> {
        let factory = |mut kwargs: KwArgs| -> Result<Layer> {
            let out = kwargs.take_usize("out_channels")?.expect("out_channels");
            let linear = Linear::new(LinearConfig::new(1, out), &Device::Cpu)?;
            Ok(Layer::from_units(vec![
                Unit::from(linear),
                Unit::from(Relu::default()),
            ]))
        };

        let params = Params::new().seq("out_channels", [2usize, 3]);
        let units: Result<Vec<Unit>> = make_layers(factory, params)?.collect();
        let names: Vec<String> = units?.iter().map(Unit::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Linear(in=1, out=2, bias=true)",
                "ReLU",
                "Linear(in=1, out=3, bias=true)",
                "ReLU",
            ]
        );
        Ok(())
    }

    #[test]
    fn broadcast_errors_surface_eagerly() {
        let factory = |_: KwArgs| -> Result<Layer> { unreachable!("never invoked") };
        let params = Params::new()
            .seq("a", [1usize, 2])
            .seq("b", [3usize, 4, 5]);
        assert!(matches!(
            make_layers(factory, params),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn factory_errors_fuse_the_sequence() {
        let factory = |mut kwargs: KwArgs| -> Result<Layer> {
            let index = kwargs.take_usize("index")?.expect("index");
            if index == 1 {
                Err(Error::EmptyMlp)
            } else {
                Ok(Layer::from(Unit::from(Relu::default())))
            }
        };

        let params = Params::new().seq("index", [0usize, 1, 2]);
        let mut layers = make_layers(factory, params).expect("make_layers");
        assert!(matches!(layers.next(), Some(Ok(_))));
        assert!(matches!(layers.next(), Some(Err(_))));
        assert!(layers.next().is_none());
    }
}
