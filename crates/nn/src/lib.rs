//! Module primitives for the `wick` layer-composition library.
//!
//! Each primitive is a config struct plus a constructed unit holding candle
//! tensors, with a plain-`Result` forward pass. The [`Unit`] enum is the
//! opaque currency the composition layer moves around: it can be stacked,
//! traced and executed, but composition code never inspects its numerics.
//!
//! Inputs follow the `(batch, channels, spatial..)` convention used
//! throughout candle. All parameters are `f32` on whatever device the unit
//! was constructed on; forward passes accept any float dtype and compute
//! statistics in `f32` where precision matters.

pub mod activation;
pub mod checks;
pub mod conv;
pub mod dropout;
pub mod flatten;
mod init;
pub mod linear;
pub mod norm;
pub mod pool;
pub mod stack;
pub mod unit;

pub use activation::Relu;
pub use conv::{Conv, ConvConfig, PaddingMode};
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use linear::{Linear, LinearConfig};
pub use norm::{BatchNorm, BatchNormConfig};
pub use pool::{Pool, PoolConfig, PoolKind};
pub use stack::Stack;
pub use unit::{Traced, Unit};
