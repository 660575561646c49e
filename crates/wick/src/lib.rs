//! Declarative layer composition for candle.
//!
//! Models are described as flat sequences of module units produced by
//! small factories. A factory turns one set of keyword arguments into a
//! [`Layer`] — a single unit or a lazy stream of units — and
//! [`make_layers`] repeats it over broadcast parameter lists:
//!
//! ```no_run
//! use wick::{channels, factory, make_layers, unit_from_layers};
//!
//! # fn main() -> wick::Result<()> {
//! let conv_block = factory("conv2_bn_relu_layer")?;
//! let net = unit_from_layers(vec![
//!     make_layers(
//!         conv_block,
//!         channels(&[3, 32, 64])?.scalar("kernel_size", 3usize),
//!     )?
//!     .into(),
//! ])?;
//! # let _ = net;
//! # Ok(())
//! # }
//! ```
//!
//! Parameters broadcast element-wise: scalars repeat for every invocation,
//! finite sequences contribute one value each and must agree on a length,
//! and cyclic sequences wrap around. Factory names like
//! `conv2_bn_relu_layer` resolve against a fixed tag registry
//! ([`registry::vocabulary`]); hand-written factories are ordinary
//! closures.
//!
//! Everything is produced lazily: broadcasting, flattening and synthesized
//! factories all yield units one at a time, and an error partway through a
//! stream leaves the already-yielded units valid.

pub mod args;
pub mod assemble;
pub mod broadcast;
pub mod channels;
pub mod error;
pub mod flatten;
pub mod invoke;
pub mod registry;

pub use args::{Arg, KwArgs};
pub use assemble::{unit_from_layers, unit_from_layers_traced};
pub use broadcast::{Params, Source};
pub use channels::{channels, channels_with_keys};
pub use error::{Error, Result};
pub use flatten::{units_from_layers, Layer, UnitStream};
pub use invoke::{make_layers, mlp_layers, LayerFactory, MakeLayers};
pub use registry::{factory, SynthFactory};

pub use wick_nn as nn;
pub use wick_nn::Unit;
